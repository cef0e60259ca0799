//! Global subscriber installation
//!
//! Kept to a single test: the subscriber is process-global.

use reveal_logging::{FileConfig, LogConfig, LogError, RevealSubscriberBuilder, RotationStrategy};

#[test]
fn test_install_once_with_file_output() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileConfig {
        directory: dir.path().to_path_buf(),
        prefix: "reveal-test".to_string(),
        rotation: RotationStrategy::Never,
    };

    let guard = RevealSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .with_file_output(file)
        .try_init()
        .unwrap();
    assert!(guard.is_some());

    tracing::warn!(guest = "g1", "written to the log file");
    drop(guard);

    let contents = std::fs::read_to_string(dir.path().join("reveal-test.log")).unwrap();
    assert!(contents.contains("written to the log file"));
    assert!(contents.contains("\"guest\":\"g1\""));

    let second = RevealSubscriberBuilder::new().try_init();
    assert!(matches!(second, Err(LogError::AlreadyInitialized(_))));
}
