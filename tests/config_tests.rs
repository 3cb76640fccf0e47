use chambers_db::db::config::{self, ConfigOrigin, DEFAULT_URL};
use chambers_db::db::ConfigError;
use secrecy::ExposeSecret;

#[test]
fn absent_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = config::load(dir.path().join("config.properties"));
    assert!(matches!(loaded.origin, ConfigOrigin::Defaults { .. }));
    assert_eq!(loaded.config.address, DEFAULT_URL);
    assert_eq!(loaded.config.principal, "root");
    assert!(!loaded.config.has_credential());
}

#[test]
fn unreadable_file_falls_back_to_defaults() {
    // A directory exists at the path but cannot be read as a file
    let dir = tempfile::tempdir().unwrap();
    let loaded = config::load(dir.path());
    match loaded.origin {
        ConfigOrigin::Defaults { reason } => assert!(reason.starts_with("Failed to read")),
        other => panic!("unexpected origin: {other:?}"),
    }
    assert_eq!(loaded.config.address, DEFAULT_URL);
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.properties");
    std::fs::write(&path, "db.url=mysql://other/db\ndb.password=\\uZZZZ\n").unwrap();

    let loaded = config::load(&path);
    assert_eq!(loaded.config.address, DEFAULT_URL);
    match config::try_load(&path) {
        Err(ConfigError::Parse { source }) => assert_eq!(source.line_number(), Some(2)),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn file_values_are_read_as_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.properties");
    std::fs::write(
        &path,
        "# exam committee database\n\
         db.url = postgres://db:5432/exams?sslmode=disable\n\
         db.username : examiner\n\
         db.password   pa ss\n",
    )
    .unwrap();

    let loaded = config::load(&path);
    assert_eq!(loaded.origin, ConfigOrigin::File(path.clone()));
    assert_eq!(loaded.config.address, "postgres://db:5432/exams?sslmode=disable");
    assert_eq!(loaded.config.principal, "examiner");
    assert_eq!(loaded.config.credential.expose_secret(), "pa ss");
}

#[test]
fn latin1_bytes_are_read_as_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.properties");
    let mut contents = b"db.url=jdbc:mysql://prod:3306/exams\ndb.username=app\ndb.password=caf".to_vec();
    contents.extend_from_slice(&[0xE9, b'\n']);
    std::fs::write(&path, contents).unwrap();

    let loaded = config::load(&path);
    assert_eq!(loaded.origin, ConfigOrigin::File(path.clone()));
    assert_eq!(loaded.config.address, "jdbc:mysql://prod:3306/exams");
    assert_eq!(loaded.config.principal, "app");
    assert_eq!(loaded.config.credential.expose_secret(), "caf\u{e9}");
}

#[test]
fn escaped_surrogate_pair_is_one_character() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.properties");
    std::fs::write(
        &path,
        "db.url=jdbc:mysql://prod:3306/exams\n\
         db.username=app\n\
         db.password=smile\\uD83D\\uDE00\n",
    )
    .unwrap();

    let loaded = config::load(&path);
    assert_eq!(loaded.origin, ConfigOrigin::File(path.clone()));
    assert_eq!(loaded.config.address, "jdbc:mysql://prod:3306/exams");
    assert_eq!(loaded.config.principal, "app");
    assert_eq!(loaded.config.credential.expose_secret(), "smile\u{1F600}");
}

#[test]
fn strict_loader_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        config::try_load(dir.path().join("nope.properties")),
        Err(ConfigError::NotFound(_))
    ));
}
