//! Chain slave: acquire network credentials from a nearby master.
//!
//! State loop: `SCANNING → REQUESTING → AWAITING_RESPONSE →
//! RECEIVING_WHITELIST → PUBLISHED`. Any failure or timeout before
//! `PUBLISHED` abandons the attempt and falls back to scanning; publishing
//! ends the task.
//!
//! While scanning, the slave hops across Wi-Fi channels looking for a
//! master's beacon marker. Hopping is a separately toggleable behavior:
//! callers making a direct connection on a fixed channel suspend it through
//! [`SlaveHandle::channel_switch_disable`] and resume it later, without
//! touching the scan state itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tendril_crypto::rsa::{KeypairProvider, RsaKeypairPem};
use tendril_radio::{
    CHANNEL_MAX, LMK_LEN, MAX_MESSAGE_LEN, PROVISION_MARKER, Pipe, Radio, RadioError, ScanRecord,
};

use crate::chain::scan::ScanQueue;
use crate::compress;
use crate::config::{NetworkConfig, Whitelist};
use crate::error::Error;
use crate::queue::ConfigQueue;
use crate::wire;

/// Slave-side protocol knobs. The defaults are the protocol's own timings;
/// deployments normally only set `lmk` and `expect_whitelist`.
#[derive(Clone)]
pub struct SlaveOptions {
    /// Local master key for the encrypted response leg; must match the
    /// master's
    pub lmk: Option<[u8; LMK_LEN]>,
    /// Whether a whitelist transfer follows the credential record; must
    /// match the master's distribution setting
    pub expect_whitelist: bool,
    /// Scan poll interval, also the channel dwell time while hopping
    pub scan_poll: Duration,
    /// Bounded wait for the credential response
    pub response_wait: Duration,
    /// Bounded wait for the whitelist transfer
    pub whitelist_wait: Duration,
    /// Tries for the whitelist transfer (transport failures only; a clean
    /// timeout is final)
    pub whitelist_tries: u32,
    /// Initial channel-hopping state; [`SlaveHandle`] can toggle it later
    pub channel_switch: bool,
}

impl Default for SlaveOptions {
    fn default() -> Self {
        Self {
            lmk: None,
            expect_whitelist: true,
            scan_poll: Duration::from_millis(100),
            response_wait: Duration::from_secs(1),
            whitelist_wait: Duration::from_secs(3),
            whitelist_tries: 3,
            channel_switch: true,
        }
    }
}

/// Handle to a running slave task.
pub struct SlaveHandle {
    running: Arc<AtomicBool>,
    hopping: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SlaveHandle {
    /// Resume channel hopping while scanning (the default).
    pub fn channel_switch_enable(&self) {
        self.hopping.store(true, Ordering::Relaxed);
        info!("slave channel switching enabled");
    }

    /// Suspend channel hopping. Required before attempting a direct
    /// connection, which needs the radio parked on one channel.
    pub fn channel_switch_disable(&self) {
        self.hopping.store(false, Ordering::Relaxed);
        info!("slave channel switching disabled");
    }

    /// Whether the slave task is still looping. `false` once credentials
    /// were published or the task was stopped.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed) && !self.task.is_finished()
    }

    /// Stop the slave and wait for its task to wind down.
    pub async fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        if let Err(e) = self.task.await {
            warn!("slave task join failed: {e}");
        }
    }
}

/// Start the slave task. Credentials, once obtained, appear in `queue`; the
/// task then exits on its own.
pub fn start(
    radio: Arc<dyn Radio>,
    keys: Arc<KeypairProvider>,
    queue: ConfigQueue,
    options: SlaveOptions,
) -> SlaveHandle {
    let running = Arc::new(AtomicBool::new(true));
    let hopping = Arc::new(AtomicBool::new(options.channel_switch));

    let task = tokio::spawn(run(
        radio,
        keys,
        queue,
        options,
        Arc::clone(&running),
        Arc::clone(&hopping),
    ));

    SlaveHandle {
        running,
        hopping,
        task,
    }
}

async fn run(
    radio: Arc<dyn Radio>,
    keys: Arc<KeypairProvider>,
    queue: ConfigQueue,
    options: SlaveOptions,
    running: Arc<AtomicBool>,
    hopping: Arc<AtomicBool>,
) {
    // The keypair exists before the first request goes out; generation runs
    // on its own blocking task with a stack sized for it
    let keypair = match keys.keypair().await {
        Ok(keypair) => keypair,
        Err(e) => {
            error!("slave cannot obtain RSA keypair: {e}");
            running.store(false, Ordering::Relaxed);
            return;
        }
    };

    let scan = ScanQueue::new();
    radio.install_marker_filter(PROVISION_MARKER, scan.sink());
    info!("chain slave started");

    while running.load(Ordering::Relaxed) {
        let Some(candidate) = scan.best_candidate(options.scan_poll).await else {
            if hopping.load(Ordering::Relaxed) {
                hop_channel(radio.as_ref());
            }
            continue;
        };

        debug!(addr = %candidate.addr, rssi = candidate.rssi, "found configured device");

        match attempt(radio.as_ref(), keypair, candidate, &options).await {
            Ok(config) => {
                queue.write(config, Some(Duration::ZERO)).await;
                info!(master = %candidate.addr, "network configuration received");
                break;
            }
            Err(Error::Radio(RadioError::Timeout)) => {
                debug!(addr = %candidate.addr, "no answer, resuming scan");
            }
            // Wrong-sized frames are unrelated traffic sharing the pipe, not
            // failures
            Err(Error::Wire(e)) => {
                debug!(addr = %candidate.addr, "discarding frame: {e}");
            }
            Err(e) => {
                warn!(addr = %candidate.addr, "attempt abandoned: {e}");
            }
        }
    }

    radio.clear_marker_filter();
    running.store(false, Ordering::Relaxed);
    info!("chain slave stopped");
}

/// Advance to the next scan channel.
fn hop_channel(radio: &dyn Radio) {
    let next = radio.channel() % CHANNEL_MAX + 1;
    if let Err(e) = radio.set_channel(next) {
        warn!(channel = next, "channel switch failed: {e}");
    }
}

/// One full handshake attempt against a selected master.
async fn attempt(
    radio: &dyn Radio,
    keypair: &RsaKeypairPem,
    candidate: ScanRecord,
    options: &SlaveOptions,
) -> Result<NetworkConfig, Error> {
    let master = candidate.addr;

    // REQUESTING: public key body plus measured signal strength, plaintext leg
    let request = wire::encode_request(&keypair.public_pem, candidate.rssi)?;

    radio.add_peer(master, None).await?;
    let sent = radio.send(Pipe::Provision, master, &request, None).await;
    radio.remove_peer(master).await?;
    sent?;

    // AWAITING_RESPONSE and beyond run on the encrypted leg
    radio.add_peer(master, options.lmk).await?;
    let result = exchange(radio, keypair, options).await;
    radio.remove_peer(master).await?;
    result
}

async fn exchange(
    radio: &dyn Radio,
    keypair: &RsaKeypairPem,
    options: &SlaveOptions,
) -> Result<NetworkConfig, Error> {
    let mut buf = vec![0u8; MAX_MESSAGE_LEN];

    // A response of any size other than the sealed-record size is unrelated
    // traffic; open_record rejects it and the caller resumes scanning
    let (_, len) = radio
        .receive(Pipe::Provision, &mut buf, Some(options.response_wait))
        .await?;

    let (session_key, mut config, whitelist_size) =
        wire::open_record(&buf[..len], &keypair.private_pem)?;

    if options.expect_whitelist {
        let mut tries = options.whitelist_tries.max(1);
        let blob_len = loop {
            match radio
                .receive(Pipe::Provision, &mut buf, Some(options.whitelist_wait))
                .await
            {
                Ok((_, n)) => break n,
                // A clean timeout means the master is gone; retrying cannot help
                Err(RadioError::Timeout) => return Err(RadioError::Timeout.into()),
                Err(e) => {
                    tries -= 1;
                    if tries == 0 {
                        return Err(e.into());
                    }
                }
            }
        };

        let blob = &mut buf[..blob_len];
        tendril_crypto::aes_cfb::cfb_decrypt(&session_key, blob);

        let raw = compress::decompress(blob, whitelist_size as usize)?;
        config.whitelist = Whitelist::decode(&raw)?;
    }

    Ok(config)
}
