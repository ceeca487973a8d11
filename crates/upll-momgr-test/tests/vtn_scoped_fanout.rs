//! VTN-scoped key type tests
//!
//! VTN flow filters and policing maps follow the VTN onto every
//! (controller, domain) pair its vrouters are placed on.

use pretty_assertions::assert_eq;
use upll_momgr::{EngineConfig, UpllError};
use upll_momgr_test::{full_capabilities, records, StoreVerifier, TestBed};
use upll_types::{ConfigKey, DataType, KeyType, KeyVtnFlowFilter, TableRole};

fn ctrlr_ids(bed: &TestBed, key: &ConfigKey, dt: DataType) -> Vec<String> {
    StoreVerifier::new(&bed.store)
        .rows_of(key, TableRole::Ctrlr, dt)
        .iter()
        .filter_map(|r| r.ctrlr_id().map(str::to_string))
        .collect()
}

/// Scenario:
/// 1. Create a VTN flow filter before any vrouter exists
/// 2. Place vrouters on c1 and c2: the filter follows each new span
/// 3. Remove the c2 vrouter: the filter leaves c2 with the span
#[tokio::test]
async fn test_flowfilter_follows_spans() {
    let mut bed = TestBed::new(&["c1", "c2"]);
    let ff: ConfigKey = KeyVtnFlowFilter::new("v1", 0).into();
    bed.create(&records::vtn("v1")).unwrap();
    bed.create(&records::vtn_flowfilter("v1", 0)).unwrap();
    assert!(ctrlr_ids(&bed, &ff, DataType::Candidate).is_empty());

    bed.create(&records::vrt("v1", "r1", "c1")).unwrap();
    bed.create(&records::vrt("v1", "r2", "c2")).unwrap();
    assert_eq!(ctrlr_ids(&bed, &ff, DataType::Candidate), vec!["c1", "c2"]);

    bed.commit().await.unwrap();
    let trace = bed.driver.trace();
    assert!(trace.contains(&"CREATE VTN_FLOWFILTER:v1/in@c1".to_string()));
    assert!(trace.contains(&"CREATE VTN_FLOWFILTER:v1/in@c2".to_string()));
    bed.driver.take();

    bed.delete(&records::vrt("v1", "r2", "c2")).unwrap();
    assert_eq!(ctrlr_ids(&bed, &ff, DataType::Candidate), vec!["c1"]);
    bed.commit().await.unwrap();
    assert_eq!(
        bed.driver.trace(),
        vec![
            "DELETE VTN_FLOWFILTER:v1/in@c2",
            "DELETE VROUTER:v1/r2@c2",
            "DELETE VTN:v1@c2",
        ]
    );
    assert_eq!(ctrlr_ids(&bed, &ff, DataType::Running), vec!["c1"]);
}

#[test]
fn test_second_vrouter_on_a_span_shares_it() {
    let mut bed = TestBed::new(&["c1"]);
    bed.create(&records::vtn("v1")).unwrap();
    bed.create(&records::vtn_policingmap("v1", "pol1")).unwrap();
    bed.create(&records::vrt("v1", "r1", "c1")).unwrap();
    bed.create(&records::vrt("v1", "r2", "c1")).unwrap();

    let verifier = StoreVerifier::new(&bed.store);
    verifier
        .assert_row_count(KeyType::Vtn, TableRole::Ctrlr, DataType::Candidate, 1)
        .unwrap();
    verifier
        .assert_row_count(KeyType::VtnPolicingMap, TableRole::Ctrlr, DataType::Candidate, 1)
        .unwrap();

    // One vrouter still holds the span.
    bed.delete(&records::vrt("v1", "r1", "c1")).unwrap();
    let verifier = StoreVerifier::new(&bed.store);
    verifier
        .assert_row_count(KeyType::VtnPolicingMap, TableRole::Ctrlr, DataType::Candidate, 1)
        .unwrap();

    bed.delete(&records::vrt("v1", "r2", "c1")).unwrap();
    let verifier = StoreVerifier::new(&bed.store);
    verifier
        .assert_row_count(KeyType::Vtn, TableRole::Ctrlr, DataType::Candidate, 0)
        .unwrap();
    verifier
        .assert_row_count(KeyType::VtnPolicingMap, TableRole::Ctrlr, DataType::Candidate, 0)
        .unwrap();
    verifier
        .assert_row_count(KeyType::VtnPolicingMap, TableRole::Main, DataType::Candidate, 1)
        .unwrap();
}

#[test]
fn test_unsupporting_controller_is_skipped() {
    let mut caps = full_capabilities(&["c1"]);
    for kt in KeyType::ALL.into_iter().filter(|kt| *kt != KeyType::VtnFlowFilter) {
        caps = caps.allow("c2", kt);
    }
    let mut bed = TestBed::with_config(EngineConfig {
        capabilities: Some(caps),
        ..EngineConfig::default()
    });
    let ff: ConfigKey = KeyVtnFlowFilter::new("v1", 0).into();
    bed.create(&records::vtn("v1")).unwrap();
    bed.create(&records::vrt("v1", "r1", "c1")).unwrap();
    bed.create(&records::vrt("v1", "r2", "c2")).unwrap();
    bed.create(&records::vtn_flowfilter("v1", 0)).unwrap();

    assert_eq!(ctrlr_ids(&bed, &ff, DataType::Candidate), vec!["c1"]);
}

#[test]
fn test_flowfilter_takes_no_update() {
    let mut bed = TestBed::new(&["c1"]);
    bed.create(&records::vtn("v1")).unwrap();
    bed.create(&records::vtn_flowfilter("v1", 1)).unwrap();

    let err = bed.update(&records::vtn_flowfilter("v1", 1)).unwrap_err();
    assert!(matches!(err, UpllError::NotAllowedForThisKt(_)));
}

#[test]
fn test_policingmap_update_reaches_controller_rows() {
    let mut bed = TestBed::new(&["c1"]);
    bed.create(&records::vtn("v1")).unwrap();
    bed.create(&records::vrt("v1", "r1", "c1")).unwrap();
    bed.create(&records::vtn_policingmap("v1", "pol1")).unwrap();

    bed.update(&records::vtn_policingmap("v1", "pol2")).unwrap();
    let rows = bed.store.rows(KeyType::VtnPolicingMap, TableRole::Ctrlr, DataType::Candidate);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].vals, records::vtn_policingmap("v1", "pol2").vals);
}
