use crate::*;
use std::net::SocketAddr;

use partcheck_core::config::PortLink;
use partcheck_flow::UdpPorts;

// ══════════════════════════════════════════════════════════════════════════════
//  Both halves over loopback UDP, as the two binaries run
// ══════════════════════════════════════════════════════════════════════════════

fn link(port: u16, bind: u16, peer: u16) -> PortLink {
    PortLink {
        port,
        bind: SocketAddr::from(([127, 0, 0, 1], bind)),
        peer: SocketAddr::from(([127, 0, 0, 1], peer)),
    }
}

/// Same wiring as the default config, on ports no other test uses.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partition_over_loopback_udp() -> Result<()> {
    let mut config = scenario_config(5_500, 10_000);
    config.ports.generator_links = vec![link(0, 47600, 47700), link(1, 47601, 47701)];
    config.ports.partitioner_links = vec![link(0, 47700, 47600), link(1, 47701, 47601)];

    let near = UdpPorts::new(config.ports.generator_links.iter().copied());
    let far = UdpPorts::new(config.ports.partitioner_links.iter().copied());

    let Finished { report, settled } =
        run_scenario(&config, near, far, reference_part2(&config)).await?;
    println!("{report}");

    assert!(settled.received_total >= 5_500);
    assert_eq!(settled.broken, 0);
    assert_eq!(settled.foreign, 0);
    assert!(report.counters.on(partcheck_harness::RxPath::Path0) > 0);
    assert!(report.counters.on(partcheck_harness::RxPath::Path1) > 0);
    Ok(())
}
