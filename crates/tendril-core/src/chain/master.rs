//! Chain master: hand network credentials to requesting slaves.
//!
//! The master advertises a beacon vendor marker, answers well-formed
//! requests one at a time, and keeps going until its duration budget runs
//! out. The marker is withdrawn the moment a request is accepted and only
//! re-published once that requester is fully served, so two slaves can never
//! race for the same master mid-handshake.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use tendril_crypto::random::random_aes_key;
use tendril_radio::{
    LMK_LEN, MAX_MESSAGE_LEN, PROVISION_MARKER, Pipe, Radio, RadioAddr, RadioError,
};

use crate::compress;
use crate::config::NetworkConfig;
use crate::error::Error;
use crate::wire;

/// Master-side protocol knobs.
#[derive(Clone)]
pub struct MasterOptions {
    /// How long to keep serving requesters
    pub duration: Duration,
    /// Local master key for the encrypted legs; must match the slaves'
    pub lmk: Option<[u8; LMK_LEN]>,
    /// Check requesters against the whitelist
    pub whitelist_check: bool,
    /// Additionally require the requester's public key to hash to the
    /// stored checksum (whitelist security)
    pub whitelist_security: bool,
    /// Push the compressed whitelist after the credentials, letting the
    /// newly configured device act as the next master in the chain
    pub distribute_whitelist: bool,
    /// Receive poll interval while advertising
    pub poll: Duration,
    /// Send tries for the whitelist push
    pub send_tries: u32,
}

impl Default for MasterOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60),
            lmk: None,
            whitelist_check: true,
            whitelist_security: false,
            distribute_whitelist: true,
            poll: Duration::from_millis(100),
            send_tries: 3,
        }
    }
}

/// Error disposition inside the serve path: peer-registration failures mean
/// the layer below is misconfigured and end the session, everything else
/// just skips the requester.
enum ServeError {
    Fatal(Error),
    Skip(Error),
}

/// Run a master session until the duration budget elapses or `cancel` is
/// raised. The session manager is the only caller.
pub(crate) async fn run(
    radio: Arc<dyn Radio>,
    config: NetworkConfig,
    options: MasterOptions,
    cancel: Arc<AtomicBool>,
) -> Result<(), Error> {
    info!("chain master started");

    let started = Instant::now();
    let mut advertising = false;
    let mut buf = vec![0u8; MAX_MESSAGE_LEN];

    let result = loop {
        if cancel.load(Ordering::Relaxed) || started.elapsed() >= options.duration {
            break Ok(());
        }

        // 1. Advertise availability
        if !advertising {
            radio.set_beacon_marker(PROVISION_MARKER);
            advertising = true;
        }

        // 2. Poll for a request; anything but an exact-size frame is
        // unrelated traffic and the marker stays up
        let (requester, len) = match radio
            .receive(Pipe::Provision, &mut buf, Some(options.poll))
            .await
        {
            Ok(received) => received,
            Err(_) => continue,
        };

        if len != wire::REQUEST_LEN {
            debug!(len, "ignoring stray frame");
            continue;
        }

        // 3. Withdraw the marker while this requester is served; no second
        // handshake may start underneath it
        radio.clear_beacon_marker();
        advertising = false;

        let request = match wire::decode_request(&buf[..len]) {
            Ok(request) => request,
            Err(e) => {
                debug!(addr = %requester, "undecodable request: {e}");
                continue;
            }
        };

        // 4. Whitelist verification; failures are silent toward the
        // requester, we simply resume advertising
        if options.whitelist_check
            && !config
                .whitelist
                .permits(requester, &request.pubkey_pem, options.whitelist_security)
        {
            debug!(addr = %requester, "requester not in whitelist");
            continue;
        }

        info!(addr = %requester, "serving provisioning request");

        match serve(radio.as_ref(), &config, &options, requester, &request.pubkey_pem).await {
            Ok(()) => {}
            Err(ServeError::Skip(e)) => {
                warn!(addr = %requester, "handshake failed: {e}");
            }
            Err(ServeError::Fatal(e)) => break Err(e),
        }
    };

    radio.clear_beacon_marker();
    info!("chain master stopped");
    result
}

/// Serve one verified requester: seal the credential record under a fresh
/// session key, deliver it, then push the compressed whitelist.
async fn serve(
    radio: &dyn Radio,
    config: &NetworkConfig,
    options: &MasterOptions,
    requester: RadioAddr,
    pubkey_pem: &str,
) -> Result<(), ServeError> {
    // 5. Fresh session key per requester, sealed under their public key
    let session_key = random_aes_key().map_err(|e| ServeError::Skip(e.into()))?;
    let sealed = wire::seal_record(&session_key, config, pubkey_pem)
        .map_err(ServeError::Skip)?;

    // 6. Deliver the credentials on the encrypted leg
    radio
        .add_peer(requester, options.lmk)
        .await
        .map_err(fatal)?;
    let sent = radio.send(Pipe::Provision, requester, &sealed, None).await;
    radio.remove_peer(requester).await.map_err(fatal)?;
    sent.map_err(|e| ServeError::Skip(e.into()))?;

    // 7. Push the whitelist so the chain can continue from the new device.
    // The credentials are already delivered; from here every failure is
    // non-fatal for this requester
    if options.distribute_whitelist {
        let compressed = match compress::compress(&config.whitelist.encode()) {
            Ok(compressed) => compressed,
            Err(e) => {
                warn!(addr = %requester, "whitelist compression failed: {e}");
                return Ok(());
            }
        };

        let mut blob = compressed;
        tendril_crypto::aes_cfb::cfb_encrypt(&session_key, &mut blob);

        radio
            .add_peer(requester, options.lmk)
            .await
            .map_err(fatal)?;

        let mut outcome = Ok(());
        for _ in 0..options.send_tries.max(1) {
            outcome = radio.send(Pipe::Provision, requester, &blob, None).await;
            if outcome.is_ok() {
                break;
            }
        }

        radio.remove_peer(requester).await.map_err(fatal)?;

        if let Err(e) = outcome {
            warn!(addr = %requester, "whitelist push failed: {e}");
        }
    }

    Ok(())
}

/// Peer-registration failure on the serve path: the transport below is
/// misconfigured, not a protocol condition.
fn fatal(e: RadioError) -> ServeError {
    ServeError::Fatal(e.into())
}
