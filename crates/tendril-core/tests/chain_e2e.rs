//! End-to-end provisioning runs over the in-memory radio hub.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tendril_core::{
    ConfigQueue, MasterOptions, MasterSessions, MeshConfig, MeshRole, NetworkConfig, SlaveOptions,
    Whitelist, WhitelistEntry, slave,
};
use tendril_crypto::rsa::KeypairProvider;
use tendril_radio::{MemoryHub, PROVISION_MARKER, Radio, RadioAddr};

const MASTER: RadioAddr = RadioAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
const SLAVE: RadioAddr = RadioAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
const OBSERVER: RadioAddr = RadioAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x03]);
const LMK: [u8; 16] = *b"chain-local-key!";

const BEACON_PERIOD: Duration = Duration::from_millis(40);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

fn network_config(whitelist: Whitelist) -> NetworkConfig {
    let mut mesh = MeshConfig::default();
    mesh.set_router("upstream-ap", "router-passphrase");
    mesh.set_mesh([0x4D, 0x45, 0x53, 0x48, 0x30, 0x31], "mesh-passphrase");
    mesh.mesh_type = MeshRole::Idle;
    mesh.channel = 1;

    NetworkConfig {
        mesh,
        whitelist,
        ..NetworkConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn slave_obtains_config_with_whitelist_security() {
    init_tracing();

    let hub = MemoryHub::new();
    let master_radio = hub.join(MASTER);
    let slave_radio = hub.join(SLAVE);
    hub.set_link_rssi(MASTER, SLAVE, -48);
    let pump = hub.spawn_beacon_pump(BEACON_PERIOD);

    // The slave's key must exist up front so the master can pin its checksum
    let keys = Arc::new(KeypairProvider::ephemeral());
    let slave_pubkey = keys.keypair().await.unwrap().public_pem.clone();

    let config = network_config(Whitelist::from_entries(vec![WhitelistEntry::for_pubkey(
        SLAVE,
        &slave_pubkey,
    )]));

    let sessions = MasterSessions::new();
    sessions
        .start(
            master_radio,
            config.clone(),
            MasterOptions {
                duration: Duration::from_secs(60),
                lmk: Some(LMK),
                whitelist_security: true,
                ..MasterOptions::default()
            },
        )
        .await
        .unwrap();

    let queue = ConfigQueue::new();
    let handle = slave::start(
        slave_radio,
        keys,
        queue.clone(),
        SlaveOptions {
            lmk: Some(LMK),
            // Both nodes already share a channel in this run
            channel_switch: false,
            ..SlaveOptions::default()
        },
    );

    let received = queue.read(Some(Duration::from_secs(10))).await.unwrap();
    assert_eq!(received.mesh, config.mesh);
    assert_eq!(received.payload, config.payload);
    assert_eq!(received.whitelist, config.whitelist);

    // Publishing ends the slave task on its own
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_running());

    pump.abort();
    sessions.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn hopping_slave_finds_master_on_another_channel() {
    init_tracing();

    let hub = MemoryHub::new();
    let master_radio = hub.join(MASTER);
    let slave_radio = hub.join(SLAVE);
    master_radio.set_channel(6).unwrap();
    let pump = hub.spawn_beacon_pump(BEACON_PERIOD);

    let config = network_config(Whitelist::from_entries(vec![WhitelistEntry::address_only(
        SLAVE,
    )]));

    let sessions = MasterSessions::new();
    sessions
        .start(
            master_radio,
            config.clone(),
            MasterOptions {
                duration: Duration::from_secs(60),
                ..MasterOptions::default()
            },
        )
        .await
        .unwrap();

    let queue = ConfigQueue::new();
    let handle = slave::start(
        slave_radio,
        Arc::new(KeypairProvider::ephemeral()),
        queue.clone(),
        SlaveOptions::default(),
    );

    // Hopping is on by default; the 13-channel sweep has to land on 6
    let received = queue.read(Some(Duration::from_secs(20))).await.unwrap();
    assert_eq!(received.mesh, config.mesh);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_running());

    pump.abort();
    sessions.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_master_sends_slave_back_to_scanning() {
    init_tracing();

    let hub = MemoryHub::new();
    let dead_master = hub.join(MASTER);
    let slave_radio = hub.join(SLAVE);
    let pump = hub.spawn_beacon_pump(BEACON_PERIOD);

    // Advertises like a master, never answers
    dead_master.set_beacon_marker(PROVISION_MARKER);

    let queue = ConfigQueue::new();
    let handle = slave::start(
        slave_radio,
        Arc::new(KeypairProvider::ephemeral()),
        queue.clone(),
        SlaveOptions {
            channel_switch: false,
            ..SlaveOptions::default()
        },
    );

    // A couple of request → 1s-timeout rounds
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(handle.is_running(), "slave must keep scanning after timeouts");
    assert!(queue.read(Some(Duration::ZERO)).await.is_err());

    handle.stop().await;
    pump.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn unlisted_slave_is_ignored_and_master_keeps_advertising() {
    init_tracing();

    let hub = MemoryHub::new();
    let master_radio = hub.join(MASTER);
    let slave_radio = hub.join(SLAVE);
    let observer_radio = hub.join(OBSERVER);
    let pump = hub.spawn_beacon_pump(BEACON_PERIOD);

    // Whitelist names some other device; our slave is not on it
    let config = network_config(Whitelist::from_entries(vec![WhitelistEntry::address_only(
        RadioAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x77]),
    )]));

    let sessions = MasterSessions::new();
    sessions
        .start(
            master_radio,
            config,
            MasterOptions {
                duration: Duration::from_secs(60),
                ..MasterOptions::default()
            },
        )
        .await
        .unwrap();

    let queue = ConfigQueue::new();
    let handle = slave::start(
        slave_radio,
        Arc::new(KeypairProvider::ephemeral()),
        queue.clone(),
        SlaveOptions {
            channel_switch: false,
            ..SlaveOptions::default()
        },
    );

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    observer_radio.install_marker_filter(
        PROVISION_MARKER,
        Arc::new(move |record| {
            let _ = tx.send(record);
        }),
    );

    // Give the slave time for several rejected attempts
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(queue.read(Some(Duration::ZERO)).await.is_err());

    // Master must still be advertising after rejecting the requester
    while rx.try_recv().is_ok() {}
    let record = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("master stopped advertising")
        .expect("observer filter dropped");
    assert_eq!(record.addr, MASTER);

    handle.stop().await;
    pump.abort();
    sessions.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn channel_switch_toggle_governs_hopping() {
    init_tracing();

    let hub = MemoryHub::new();
    let slave_radio = hub.join(SLAVE);

    let handle = slave::start(
        Arc::clone(&slave_radio) as Arc<dyn Radio>,
        Arc::new(KeypairProvider::ephemeral()),
        ConfigQueue::new(),
        SlaveOptions {
            channel_switch: false,
            ..SlaveOptions::default()
        },
    );

    // Parked: the channel must hold while nothing is found
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(slave_radio.channel(), 1);

    // Enabled: empty scan polls start walking the channel plan
    handle.channel_switch_enable();
    let hopped = async {
        while slave_radio.channel() == 1 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), hopped)
        .await
        .expect("slave never hopped with switching enabled");

    // Disabled again: the channel freezes wherever the sweep was
    handle.channel_switch_disable();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let parked = slave_radio.channel();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(slave_radio.channel(), parked);

    handle.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn new_master_session_preempts_the_old_one() {
    init_tracing();

    let hub = MemoryHub::new();
    let master_radio = hub.join(MASTER);

    let config = network_config(Whitelist::from_entries(vec![WhitelistEntry::address_only(
        SLAVE,
    )]));

    let sessions = MasterSessions::new();
    sessions
        .start(
            Arc::clone(&master_radio) as Arc<dyn Radio>,
            config.clone(),
            MasterOptions {
                duration: Duration::from_secs(60),
                ..MasterOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(sessions.is_active().await);

    // Starting again must gracefully retire the 60-second session first
    let started = Instant::now();
    sessions
        .start(
            master_radio,
            config,
            MasterOptions {
                duration: Duration::from_millis(300),
                ..MasterOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "preemption must not wait out the old duration"
    );

    let outcome = sessions.wait().await.expect("second session running");
    outcome.unwrap();
    assert!(!sessions.is_active().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn master_rejects_empty_whitelist_when_checking() {
    let hub = MemoryHub::new();
    let master_radio = hub.join(MASTER);

    let sessions = MasterSessions::new();
    let err = sessions
        .start(
            master_radio,
            network_config(Whitelist::new()),
            MasterOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, tendril_core::Error::InvalidArgument(_)));
}
