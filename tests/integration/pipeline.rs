use crate::*;
use partcheck_harness::{RxPath, Verdict};

// ══════════════════════════════════════════════════════════════════════════════
//  Clean runs over the in-memory wire
// ══════════════════════════════════════════════════════════════════════════════

/// Fifty full partition cycles through the reference topology pass and
/// split close to 1000:100.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reference_partition_passes() -> Result<()> {
    let config = scenario_config(55_000, 100_000);
    let (near, far) = memory_wire();

    let Finished { report, .. } = run_scenario(&config, near, far, reference_part2(&config)).await?;
    println!("{report}");

    assert_eq!(report.verdict, Verdict::Pass, "shortfalls: {:?}", report.shortfalls);
    assert!(
        (89..=92).contains(&report.percent[0]),
        "path 0 share {}%",
        report.percent[0]
    );
    assert!(
        (8..=11).contains(&report.percent[1]),
        "path 1 share {}%",
        report.percent[1]
    );
    assert_eq!(report.counters.broken, 0);
    assert_eq!(report.counters.foreign, 0);
    assert!(report.counters.received_total >= 55_000);
    assert!(report.received <= report.counters.sent);
    Ok(())
}

/// Once both graphs are idle, every arrival sits in exactly one category.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_arrival_is_classified_once() -> Result<()> {
    let config = scenario_config(11_000, 100_000);
    let (near, far) = memory_wire();

    let Finished { settled, .. } = run_scenario(&config, near, far, reference_part2(&config)).await?;

    assert_eq!(
        settled.received_path0 + settled.received_path1 + settled.broken + settled.foreign,
        settled.received_total
    );
    assert!(settled.received_total <= settled.sent);
    Ok(())
}

/// A lossless wire delivers everything except what is still queued when the
/// verdict is taken.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delivery_ratio_on_lossless_wire() -> Result<()> {
    let config = scenario_config(22_000, 100_000);
    let (near, far) = memory_wire();

    let Finished { report, .. } = run_scenario(&config, near, far, reference_part2(&config)).await?;

    assert!(report.delivery > 90, "delivery {}%", report.delivery);
    assert!(report.counters.on(RxPath::Path0) > report.counters.on(RxPath::Path1));
    Ok(())
}

/// A Part 2 that forwards everything to one port fails on both bands.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unpartitioned_forwarding_fails_bands() -> Result<()> {
    let config = scenario_config(5_000, 100_000);
    let (near, far) = memory_wire();

    let Finished { report, .. } = run_scenario(&config, near, far, |graph| {
        let flow = graph.set_receiver(0)?;
        graph.set_sender(flow, 0)
    })
    .await?;

    assert_eq!(report.verdict, Verdict::Fail);
    assert_eq!(report.percent, [100, 0]);
    assert_eq!(report.counters.on(RxPath::Path1), 0);
    Ok(())
}

/// The structured report renders with the same numbers as the text one.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_json_report_from_real_run() -> Result<()> {
    let config = scenario_config(11_000, 100_000);
    let (near, far) = memory_wire();

    let Finished { report, .. } = run_scenario(&config, near, far, reference_part2(&config)).await?;

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(json["verdict"], "PASS");
    assert_eq!(json["counters"]["sent"], report.counters.sent);
    assert_eq!(json["received"], report.received);
    assert_eq!(json["percent"][0], report.percent[0]);
    Ok(())
}
