//! Interface lineage tests
//!
//! Flow filters bound to a vrouter interface only reach the controller once
//! the interface is backed by a vlink or a portmap.

use pretty_assertions::assert_eq;
use upll_momgr::IpcReqRespHeader;
use upll_momgr_test::{records, StoreVerifier, TestBed};
use upll_types::{
    Attr, ConfigKey, ConfigKeyVal, ConfigStatus, ConfigVal, DataType, InterfaceType,
    KeyVrtIfFlowFilterEntry, Operation, Option1, ValDriverVrtIf, ValFlowFilterEntryStats,
};

const FF: &str = "VRTIF_FLOWFILTER:v1/r1/if1/in@c1";
const ENTRY: &str = "VRTIF_FLOWFILTER_ENTRY:v1/r1/if1/in/1@c1";

/// VTN v1, vrouter r1 on c1 with interface if1, an input filter on if1
/// and entry 1 matching flow list fl1.
fn filtered_bed() -> TestBed {
    let mut bed = TestBed::new(&["c1"]);
    bed.populate_vrouter("v1", "r1", "c1").unwrap();
    bed.create(&records::flowlist("fl1")).unwrap();
    bed.create(&records::vrt_if_flowfilter("v1", "r1", "if1", 0)).unwrap();
    let ff = records::vrt_if_flowfilter_key("v1", "r1", "if1", 0);
    bed.create(&records::flowfilter_entry(ff, 1, Some("fl1"))).unwrap();
    bed
}

fn filter_lines(bed: &TestBed) -> Vec<String> {
    bed.driver
        .trace()
        .into_iter()
        .filter(|line| line.contains("FLOWFILTER"))
        .collect()
}

#[tokio::test]
async fn test_filter_waits_for_interface() {
    let mut bed = filtered_bed();
    bed.commit().await.unwrap();

    assert!(filter_lines(&bed).is_empty());
    // Flow lists are never pushed.
    assert!(bed.driver.trace().iter().all(|l| !l.contains("FLOWLIST")));

    let ff: ConfigKey = records::vrt_if_flowfilter_key("v1", "r1", "if1", 0).into();
    StoreVerifier::new(&bed.store)
        .assert_status(&ff, DataType::Running, ConfigStatus::NotApplied)
        .unwrap();
}

/// Scenario:
/// 1. Commit a filter on an unbacked interface
/// 2. Attach a vlink and commit: the filter is created on the controller
/// 3. Detach and commit: the filter is deleted from the controller
#[tokio::test]
async fn test_lineage_change_reclassifies_updates() {
    let mut bed = filtered_bed();
    bed.commit().await.unwrap();
    bed.driver.take();

    let if_key = records::vrt_if_key("v1", "r1", "if1");
    bed.engine
        .set_vlink_portmap_configuration(
            &mut bed.store,
            DataType::Candidate,
            &if_key,
            Some(InterfaceType::Vlink),
        )
        .unwrap();
    bed.commit().await.unwrap();
    assert_eq!(
        filter_lines(&bed),
        vec![format!("CREATE {}", FF), format!("CREATE {}", ENTRY)]
    );

    let requests = bed.driver.take();
    let entry = requests
        .iter()
        .find(|r| r.ckv.key_type() == upll_types::KeyType::VrtIfFlowFilterEntry)
        .unwrap();
    assert_eq!(
        entry.ckv.vals[0],
        ConfigVal::DriverVrtIf(ValDriverVrtIf {
            interface_type: Attr::Valid(InterfaceType::Vlink),
        })
    );
    let ff: ConfigKey = records::vrt_if_flowfilter_key("v1", "r1", "if1", 0).into();
    StoreVerifier::new(&bed.store)
        .assert_status(&ff, DataType::Running, ConfigStatus::Applied)
        .unwrap();

    bed.engine
        .set_vlink_portmap_configuration(&mut bed.store, DataType::Candidate, &if_key, None)
        .unwrap();
    bed.commit().await.unwrap();
    assert_eq!(
        filter_lines(&bed),
        vec![format!("DELETE {}", FF), format!("DELETE {}", ENTRY)]
    );
    StoreVerifier::new(&bed.store)
        .assert_status(&ff, DataType::Running, ConfigStatus::NotApplied)
        .unwrap();
}

#[tokio::test]
async fn test_switching_vlink_to_portmap_is_an_update() {
    let mut bed = filtered_bed();
    let if_key = records::vrt_if_key("v1", "r1", "if1");
    bed.engine
        .set_vlink_portmap_configuration(
            &mut bed.store,
            DataType::Candidate,
            &if_key,
            Some(InterfaceType::Vlink),
        )
        .unwrap();
    bed.commit().await.unwrap();
    bed.driver.take();

    bed.engine
        .set_vlink_portmap_configuration(
            &mut bed.store,
            DataType::Candidate,
            &if_key,
            Some(InterfaceType::Portmap),
        )
        .unwrap();
    bed.commit().await.unwrap();
    assert_eq!(
        filter_lines(&bed),
        vec![format!("UPDATE {}", FF), format!("UPDATE {}", ENTRY)]
    );
}

#[tokio::test]
async fn test_detail_read_folds_controller_counters() {
    let mut bed = filtered_bed();
    let if_key = records::vrt_if_key("v1", "r1", "if1");
    bed.engine
        .set_vlink_portmap_configuration(
            &mut bed.store,
            DataType::Candidate,
            &if_key,
            Some(InterfaceType::Portmap),
        )
        .unwrap();
    bed.commit().await.unwrap();

    let entry_key = KeyVrtIfFlowFilterEntry::new(
        records::vrt_if_flowfilter_key("v1", "r1", "if1", 0),
        1,
    );
    let stats = ConfigVal::FlowFilterEntryStats(ValFlowFilterEntryStats {
        software_packets: 10,
        software_octets: 640,
        hardware_packets: 4,
        hardware_octets: 256,
    });
    bed.driver
        .answer_reads_with(ConfigKeyVal::with_val(entry_key.clone(), stats.clone()));

    let req = IpcReqRespHeader::new(Operation::Read, DataType::State).with_option1(Option1::Detail);
    let rows = bed
        .engine
        .read_mo(&req, &ConfigKeyVal::new(entry_key), &bed.store)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].vals.len(), 2);
    assert_eq!(rows[0].vals[1], stats);
    // Reads never leak controller placement.
    assert_eq!(rows[0].ctrlr_id(), None);

    let read = bed.driver.requests().pop().unwrap();
    assert_eq!(read.operation, Operation::Read);
    assert_eq!(read.option1, Option1::Detail);
    assert_eq!(read.ctrlr_id, "c1");
}

#[test]
fn test_detail_read_only_on_state() {
    let bed = filtered_bed();
    let ff = ConfigKeyVal::new(records::vrt_if_flowfilter_key("v1", "r1", "if1", 0));

    let req = IpcReqRespHeader::new(Operation::Read, DataType::Candidate);
    assert_eq!(bed.read(DataType::Candidate, &ff).unwrap().len(), 1);

    let detail = req.with_option1(Option1::Detail);
    assert!(bed.engine.read_mo(&detail, &ff, &bed.store).is_err());
    assert!(bed.driver.requests().is_empty());
}
