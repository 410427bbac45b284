use crate::*;
use partcheck_core::wire::MTU;
use partcheck_core::{Packet, PacketError};
use partcheck_harness::{Shortfall, Verdict};

// ══════════════════════════════════════════════════════════════════════════════
//  Damaged traffic and pipeline failures
// ══════════════════════════════════════════════════════════════════════════════

/// Byte offset of the IPv4 identification field in an untagged frame.
const IPV4_IDENT: usize = 18;

/// Part 2 that runs `damage` on every packet before partitioning it.
fn damaging_part2<D>(
    config: &PartcheckConfig,
    damage: D,
) -> impl FnOnce(&mut FlowGraph) -> Result<(), FlowError>
where
    D: FnMut(&mut Packet) + Send + 'static,
{
    let partition = config.partition.clone();
    move |graph| {
        let flow = graph.set_receiver(partition.input_port)?;
        graph.set_handler(flow, damage)?;
        let second = graph.set_partitioner(flow, partition.block_a, partition.block_b)?;
        graph.set_sender(flow, partition.output_a)?;
        graph.set_sender(second, partition.output_b)
    }
}

/// Every twentieth packet has a header byte flipped in transit. Those are
/// counted as broken, never as received, and the rest still pass.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_header_corruption_is_counted_as_broken() -> Result<()> {
    let config = scenario_config(22_000, 100_000);
    let (near, far) = memory_wire();

    let mut seen = 0u64;
    let corrupt_every_20th = move |pkt: &mut Packet| {
        seen += 1;
        if seen % 20 == 0 {
            if let Some(b) = pkt.frame_mut().get_mut(IPV4_IDENT) {
                *b ^= 0xff;
            }
        }
    };

    let Finished { report, settled } =
        run_scenario(&config, near, far, damaging_part2(&config, corrupt_every_20th)).await?;
    println!("{report}");

    assert!(report.counters.broken > 0);
    assert_eq!(settled.foreign, 0);
    // one in twenty, give or take what was in flight
    let share = settled.broken * 100 / settled.received_total;
    assert!((4..=6).contains(&share), "broken share {share}%");
    assert_eq!(
        settled.received() + settled.broken,
        settled.received_total
    );
    assert_eq!(report.verdict, Verdict::Pass, "shortfalls: {:?}", report.shortfalls);
    Ok(())
}

/// Part 2 rewrites every frame into something that is not IP. Every arrival
/// is skipped as foreign, the sample target is still reached, and the run
/// fails with nothing received.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_foreign_only_traffic_fails() -> Result<()> {
    let config = scenario_config(5_500, 100_000);
    let (near, far) = memory_wire();

    let to_arp = |pkt: &mut Packet| {
        if let Some(ether_type) = pkt.frame_mut().get_mut(12..14) {
            ether_type.copy_from_slice(&[0x08, 0x06]);
        }
    };

    let Finished { report, settled } =
        run_scenario(&config, near, far, damaging_part2(&config, to_arp)).await?;
    println!("{report}");

    assert_eq!(report.verdict, Verdict::Fail);
    assert_eq!(report.received, 0);
    assert_eq!(report.percent, [0, 0]);
    assert_eq!(settled.broken, 0);
    assert_eq!(settled.foreign, settled.received_total);
    assert!(report
        .shortfalls
        .iter()
        .any(|s| matches!(s, Shortfall::DeliveryAtOrBelowLimit { delivery: 0, .. })));
    Ok(())
}

/// A generator that cannot build its packet stops the run before any
/// verdict is produced.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fatal_generator_aborts_run() -> Result<()> {
    let config = scenario_config(1_000_000, 1_000);
    let (near, _far) = memory_wire();

    let harness = Harness::from_config(&config);
    let mut graph = FlowGraph::new(near).with_queue_depth(QUEUE_DEPTH);
    harness.install(&mut graph, &config.generator)?;
    let oversized = graph.set_generator(
        |pkt: &mut Packet| pkt.init_ether_ipv4_udp(MTU).map(|_| ()),
        1_000,
    )?;
    graph.set_stopper(oversized)?;
    let mut running = graph.start().await?;

    let outcome = tokio::time::timeout(RUN_TIMEOUT, harness.run(&mut running)).await?;
    let source = match outcome {
        Err(FlowError::Fatal(source)) => source,
        other => panic!("expected a fatal generator error, got {other:?}"),
    };
    assert!(matches!(
        source.downcast_ref::<PacketError>(),
        Some(PacketError::PayloadTooLarge(n)) if *n == MTU
    ));
    assert!(!harness.completion().is_fired());
    Ok(())
}

/// Part 2 dying mid-run surfaces as an error instead of a verdict.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_part2_failure_ends_scenario() -> Result<()> {
    let config = scenario_config(1_000_000, 10_000);
    let (near, far) = memory_wire();

    let outcome = run_scenario(&config, near, far, |graph| {
        let flow = graph.set_generator(
            |pkt: &mut Packet| pkt.init_ether_ipv4_udp(MTU + 1).map(|_| ()),
            10,
        )?;
        graph.set_stopper(flow)?;
        let rx = graph.set_receiver(0)?;
        graph.set_stopper(rx)
    })
    .await;

    let err = match outcome {
        Ok(finished) => panic!("expected part 2 failure, got a verdict:\n{}", finished.report),
        Err(e) => e,
    };
    assert!(format!("{err:#}").contains("part 2 failed"), "{err:#}");
    Ok(())
}
