use std::io;

use crate::model::{CleaningTask, Reservation, STAMP_FORMAT};

const RESERVATION_HEADERS: [&str; 7] = [
    "id",
    "customerName",
    "email",
    "phone",
    "rooms",
    "checkIn",
    "checkOut",
];

const TASK_HEADERS: [&str; 5] = ["taskId", "room", "cleaningDate", "reservationId", "completed"];

fn csv_error(e: csv::Error) -> io::Error {
    io::Error::other(e)
}

/// Write `header` and `rows` as CSV with every field quoted.
fn write_delimited<I>(header: &[&str], rows: I) -> io::Result<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(header).map_err(csv_error)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_error)?;
    }
    writer.flush()?;

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(io::Error::other)
}

/// All reservations, one row each; rooms are joined into a single field.
pub fn reservations_csv(reservations: &[Reservation]) -> io::Result<String> {
    write_delimited(
        &RESERVATION_HEADERS,
        reservations.iter().map(|r| {
            vec![
                r.id.to_string(),
                r.customer_name.clone(),
                r.email.clone(),
                r.phone.clone(),
                r.rooms.join(","),
                r.check_in.format(STAMP_FORMAT).to_string(),
                r.check_out.format(STAMP_FORMAT).to_string(),
            ]
        }),
    )
}

/// The whole cleaning schedule, one row per task.
pub fn cleaning_schedule_csv(tasks: &[CleaningTask]) -> io::Result<String> {
    write_delimited(
        &TASK_HEADERS,
        tasks.iter().map(|t| {
            vec![
                t.task_id.to_string(),
                t.room.clone(),
                t.cleaning_date.to_string(),
                t.reservation_id.to_string(),
                t.completed.to_string(),
            ]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_stamp;

    fn reservation() -> Reservation {
        Reservation {
            id: 7,
            customer_name: "O'Brien, \"Pat\"".into(),
            email: "pat@example.com".into(),
            phone: String::new(),
            rooms: vec!["105".into(), "107".into()],
            check_in: parse_stamp("2025-03-01T16:00").unwrap(),
            check_out: parse_stamp("2025-03-03T11:00").unwrap(),
        }
    }

    #[test]
    fn reservations_are_fully_quoted() {
        let out = reservations_csv(&[reservation()]).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some(r#""id","customerName","email","phone","rooms","checkIn","checkOut""#)
        );
        assert_eq!(
            lines.next(),
            Some(
                r#""7","O'Brien, ""Pat""","pat@example.com","","105,107","2025-03-01T16:00","2025-03-03T11:00""#
            )
        );
        assert_eq!(lines.next(), None);
        assert!(!out.contains('\r'));
    }

    #[test]
    fn cleaning_schedule_rows() {
        let tasks = vec![CleaningTask {
            task_id: 3,
            room: "105".into(),
            cleaning_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            reservation_id: 7,
            completed: true,
        }];
        let out = cleaning_schedule_csv(&tasks).unwrap();
        assert_eq!(
            out,
            "\"taskId\",\"room\",\"cleaningDate\",\"reservationId\",\"completed\"\n\
             \"3\",\"105\",\"2025-03-03\",\"7\",\"true\"\n"
        );
    }

    #[test]
    fn empty_export_has_header_only() {
        let out = cleaning_schedule_csv(&[]).unwrap();
        assert_eq!(out.lines().count(), 1);
    }
}
