use solar_savings::error::SavingsError;

#[test]
fn error_constructors() {
    assert!(matches!(
        SavingsError::config("x"),
        SavingsError::Config { .. }
    ));
    assert!(matches!(
        SavingsError::validation("f", "m"),
        SavingsError::Validation { .. }
    ));
    assert!(matches!(SavingsError::io("x"), SavingsError::Io { .. }));
    assert!(matches!(SavingsError::host("x"), SavingsError::Host { .. }));
    assert!(matches!(
        SavingsError::generic("x"),
        SavingsError::Generic { .. }
    ));
}

#[test]
fn conversions_keep_the_message() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(
        SavingsError::from(json_err),
        SavingsError::Serialization { .. }
    ));

    let date_err = "2025-13-01".parse::<chrono::NaiveDate>().unwrap_err();
    match SavingsError::from(date_err) {
        SavingsError::Validation { field, .. } => assert_eq!(field, "date"),
        other => panic!("unexpected {other:?}"),
    }

    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err = SavingsError::from(io_err);
    assert!(err.to_string().contains("gone"));
}
