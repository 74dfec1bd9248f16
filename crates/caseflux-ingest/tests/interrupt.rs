//! Shutdown handling
//!
//! Lives in its own test binary: the shutdown flag is process-global.

use caseflux_core::{IngestError, ProgressContext, request_shutdown};
use caseflux_ingest::{Config, DryRunSink, run};

#[test]
fn shutdown_request_aborts_without_checkpoint() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    std::fs::create_dir(&data).unwrap();
    std::fs::write(
        data.join("03-01-2020.csv"),
        "Province/State,Country/Region,Last Update,Confirmed,Deaths,Recovered\n\
         Hubei,Mainland China,2020-03-01T10:00:00,100,2,10\n",
    )
    .unwrap();
    let config = Config {
        data_dir: data,
        checkpoint_path: tmp.path().join(".last"),
        ..Default::default()
    };

    request_shutdown();
    let err = run(&config, DryRunSink::new("cases"), None, &ProgressContext::hidden()).unwrap_err();
    assert!(matches!(err, IngestError::Interrupted), "{err}");
    assert_eq!(err.exit_code(), 130);
    assert!(!config.checkpoint_path.exists());
}
