//! hdd workers with cleanup off leave their files in the target directory.
use std::fs;

use havoc::constants::HDD_BUF_SIZE;
use havoc::StressorKind;
use havoc_test_support::Scenario;

#[test]
fn test_noclean_files_survive_the_run() {
    let scenario = Scenario::new()
        .with_workers(StressorKind::Hdd, 1)
        .with_max_ops(StressorKind::Hdd, 1000)
        .with_hdd_noclean()
        .with_scratch_dir()
        .unwrap();
    let outcome = scenario.run();

    let report = outcome.report().expect("run failed");
    assert!(report.is_success());
    assert_eq!(outcome.total_ops(StressorKind::Hdd), 1000);

    let dir = scenario.scratch_dir().unwrap();
    let mut files = 0;
    let mut bytes = 0;
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let name = entry.file_name().to_string_lossy().into_owned();
        assert!(name.starts_with("havoc-"), "unexpected file {name}");
        bytes += entry.metadata().unwrap().len();
        files += 1;
    }
    // 16 blocks per 1 MiB file: 62 full files and one holding 8 blocks
    assert_eq!(files, 63);
    assert_eq!(bytes, 1000 * HDD_BUF_SIZE as u64);
    assert!(!outcome.shm_leaked);
}
