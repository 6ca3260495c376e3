//! CSV appender tests.

use cachefx_core::report::{fmt_f64, CsvAppender};

/// The header is written exactly when the file is empty at open time.
#[test]
fn header_written_exactly_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("results.csv");

    {
        let mut writer = CsvAppender::open(&path, ',', &["A", "B"]).expect("open");
        writer
            .write_row(&["1".to_owned(), "2".to_owned()])
            .expect("row");
        writer.flush().expect("flush");
    }
    {
        let mut writer = CsvAppender::open(&path, ',', &["A", "B"]).expect("reopen");
        writer
            .write_row(&["3".to_owned(), "4".to_owned()])
            .expect("row");
        writer.flush().expect("flush");
    }

    let contents = std::fs::read_to_string(&path).expect("read");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines, ["A,B", "1,2", "3,4"]);
}

/// Custom delimiters are honoured.
#[test]
fn custom_delimiter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("results.csv");
    let mut writer = CsvAppender::open(&path, ';', &["X", "Y", "Z"]).expect("open");
    writer
        .write_row(&["a".to_owned(), "b".to_owned(), "c".to_owned()])
        .expect("row");
    writer.flush().expect("flush");

    let contents = std::fs::read_to_string(&path).expect("read");
    assert_eq!(contents, "X;Y;Z\na;b;c\n");
}

/// Floats format without trailing noise; integers drop the point.
#[test]
fn float_formatting() {
    assert_eq!(fmt_f64(3.0), "3");
    assert_eq!(fmt_f64(0.5), "0.500000");
    assert_eq!(fmt_f64(-2.0), "-2");
}
