//! Rename integration tests
//!
//! A renamed object keeps the name its controllers already know. These
//! tests check the controller side of a rename through commits.

use pretty_assertions::assert_eq;
use upll_momgr::UpllError;
use upll_momgr_test::{records, StoreVerifier, TestBed};
use upll_types::{ConfigKey, DataType, KeyType, KeyVrt, KeyVrtIf, KeyVtn, TableRole};

#[tokio::test]
async fn test_renamed_vtn_keeps_controller_name() {
    let mut bed = TestBed::new(&["c1"]);
    bed.create(&records::vtn("v1")).unwrap();
    bed.create(&records::vrt("v1", "r1", "c1")).unwrap();
    bed.commit().await.unwrap();
    bed.driver.take();

    bed.rename(&records::rename_vtn("v1", "v2")).unwrap();
    bed.commit().await.unwrap();

    // The UNC key moved, so the controller sees a delete and a create of
    // the same controller name.
    assert_eq!(
        bed.driver.trace(),
        vec![
            "DELETE VROUTER:v1/r1@c1",
            "DELETE VTN:v1@c1",
            "CREATE VTN:v1@c1",
            "CREATE VROUTER:v1/r1@c1",
        ]
    );

    let v2: ConfigKey = KeyVtn::new("v2").into();
    let verifier = StoreVerifier::new(&bed.store);
    verifier.assert_exists(&v2, TableRole::Main, DataType::Running).unwrap();
    verifier.assert_exists(&v2, TableRole::Rename, DataType::Running).unwrap();
    verifier
        .assert_absent(&KeyVtn::new("v1").into(), TableRole::Main, DataType::Running)
        .unwrap();
    assert!(verifier.main_row(&v2, DataType::Running).unwrap().flags().vtn_renamed);
    let vrt = verifier
        .main_row(&KeyVrt::new("v2", "r1").into(), DataType::Running)
        .unwrap();
    assert!(vrt.flags().vtn_renamed);
}

#[test]
fn test_rename_back_drops_alias() {
    let mut bed = TestBed::new(&["c1"]);
    bed.create(&records::vtn("v1")).unwrap();
    bed.create(&records::vrt("v1", "r1", "c1")).unwrap();

    bed.rename(&records::rename_vtn("v1", "v2")).unwrap();
    assert_eq!(
        bed.store.row_count(KeyType::Vtn, TableRole::Rename, DataType::Candidate),
        1
    );

    bed.rename(&records::rename_vtn("v2", "v1")).unwrap();
    assert_eq!(
        bed.store.row_count(KeyType::Vtn, TableRole::Rename, DataType::Candidate),
        0
    );

    let verifier = StoreVerifier::new(&bed.store);
    let vtn = verifier
        .main_row(&KeyVtn::new("v1").into(), DataType::Candidate)
        .unwrap();
    assert!(!vtn.flags().vtn_renamed);
    let vrt = verifier
        .main_row(&KeyVrt::new("v1", "r1").into(), DataType::Candidate)
        .unwrap();
    assert!(!vrt.flags().any_renamed());
}

#[tokio::test]
async fn test_renamed_vrouter_pushes_children_under_old_name() {
    let mut bed = TestBed::new(&["c1"]);
    bed.populate_vrouter("v1", "r1", "c1").unwrap();

    bed.rename(&records::rename_vrt("v1", "r1", "r9")).unwrap();
    let verifier = StoreVerifier::new(&bed.store);
    verifier
        .assert_exists(
            &KeyVrtIf::new("v1", "r9", "if1").into(),
            TableRole::Main,
            DataType::Candidate,
        )
        .unwrap();

    bed.commit().await.unwrap();
    assert_eq!(
        bed.driver.trace(),
        vec![
            "CREATE VTN:v1@c1",
            "CREATE VROUTER:v1/r1@c1",
            "CREATE VRT_IF:v1/r1/if1@c1",
        ]
    );
}

#[test]
fn test_rename_onto_existing_name_fails() {
    let mut bed = TestBed::new(&["c1"]);
    bed.create(&records::vtn("v1")).unwrap();
    bed.create(&records::vtn("v2")).unwrap();

    let err = bed.rename(&records::rename_vtn("v1", "v2")).unwrap_err();
    assert_eq!(err, UpllError::InstanceExists("VTN:v2".into()));
    assert_eq!(
        bed.store.row_count(KeyType::Vtn, TableRole::Main, DataType::Candidate),
        2
    );
}

#[test]
fn test_rename_needs_a_name() {
    let mut bed = TestBed::new(&["c1"]);
    bed.create(&records::vtn("v1")).unwrap();

    let err = bed.rename(&records::vtn("v1")).unwrap_err();
    assert!(matches!(err, UpllError::BadRequest(_)));
    let err = bed.rename(&records::rename_vtn("v1", "bad name")).unwrap_err();
    assert!(matches!(err, UpllError::CfgSyntax(_)));
}
