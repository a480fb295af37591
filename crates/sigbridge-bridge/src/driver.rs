//! Bridge driver: the arbitration core.
//!
//! Pure event→action logic with no I/O. The runtime feeds it everything
//! that happens (display lines, inbound datagrams, decoded telemetry
//! words, timer cadences) and executes the actions it returns, in order,
//! before the next event is consumed. That ordering is what makes the
//! per-write propagation "synchronous with the call" and what serializes
//! RPC traffic through the single coprocessor client.
//!
//! Nothing in here can fail: malformed or unauthorized input is logged
//! and dropped, per the overriding never-crash policy.

use sigbridge_core::{
    Mode, MODE_SIGNAL, SignalRegistry, SignalSource, SignalValue, WriteOrigin, WriteOutcome,
    env::Environment,
};
use sigbridge_proto::{
    ACK_OK, ACK_SET, DisplayEvent, DisplayOp, DisplayRecord, FRAME_LEN, SignKey, SignalFrame,
    telemetry::{SampleMerge, TelemetryPage},
};

/// Signal committed from telemetry flag bit 0.
const SIG_EXTERN_ENABLE: &str = "extern_enable";
/// Signal committed from the page-0 voltage field.
const SIG_VOLT_ACT: &str = "volt_act";
/// Signal committed from the page-0 current field.
const SIG_CURR_ACT: &str = "curr_act";
/// Locally-owned half of the composite output rule.
const SIG_INTERNAL_ENABLE: &str = "internal_enable";
/// Composite output: `internal_enable AND extern_enable`.
const SIG_OUTPUT_ENABLE: &str = "output_enable";

/// Everything that can happen to the bridge.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// One raw line read from the display link.
    DisplayLine(String),

    /// One datagram received from a network client (not yet verified).
    Datagram(Vec<u8>),

    /// Result word of a successful coprocessor poll.
    TelemetryWord(u64),

    /// Coprocessor poll cadence elapsed (~20 Hz).
    PollDue,

    /// Full-table broadcast cadence elapsed (~5 Hz).
    BroadcastDue,
}

/// Side effects the runtime must execute, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeAction {
    /// Write one record to the display link.
    PushDisplay(DisplayRecord),

    /// Send one signed frame to every known client address.
    BroadcastFrame([u8; FRAME_LEN]),

    /// Invoke a named setter on the coprocessor (fire-and-forget, retried
    /// per the setter policy; failure never blocks the local write).
    CallSetter {
        /// Remote procedure name.
        function: String,
        /// Argument value.
        value: SignalValue,
    },

    /// Issue one `get_poll_data()` call and feed the result word back as
    /// [`BridgeEvent::TelemetryWord`].
    PollCoprocessor,
}

/// The arbitration core. Owns the registry, the telemetry merge buffer,
/// the frame signing key, and the nonce entropy source.
pub struct BridgeDriver<E: Environment> {
    registry: SignalRegistry,
    merge: SampleMerge,
    key: SignKey,
    env: E,
}

impl<E: Environment> BridgeDriver<E> {
    /// Create a driver over a loaded registry.
    pub fn new(registry: SignalRegistry, key: SignKey, env: E) -> Self {
        Self { registry, merge: SampleMerge::new(), key, env }
    }

    /// Read access to the signal table (runtime startup, tests).
    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    /// Process one event and return the side effects to execute.
    pub fn process_event(&mut self, event: BridgeEvent) -> Vec<BridgeAction> {
        match event {
            BridgeEvent::DisplayLine(line) => self.handle_display_line(&line),
            BridgeEvent::Datagram(data) => self.handle_datagram(&data),
            BridgeEvent::TelemetryWord(word) => self.handle_telemetry_word(word),
            BridgeEvent::PollDue => vec![BridgeAction::PollCoprocessor],
            BridgeEvent::BroadcastDue => self.full_broadcast(),
        }
    }

    /// Inbound display-link record.
    fn handle_display_line(&mut self, line: &str) -> Vec<BridgeAction> {
        if line.trim().is_empty() {
            return Vec::new();
        }

        let event = match DisplayRecord::parse(line) {
            Ok(DisplayRecord::Event(event)) => event,
            Ok(DisplayRecord::Config(_)) => {
                tracing::debug!("ignoring config record from display");
                return Vec::new();
            },
            Err(err) => {
                tracing::warn!(%err, "dropping unparseable display line");
                return Vec::new();
            },
        };

        if event.event_kind != sigbridge_proto::EventKind::ButtonPress {
            return Vec::new();
        }
        let name = event.name.as_str();

        // Mode changes are always accepted from the display; everything
        // else is dropped while a remote actor owns the signals.
        if name != MODE_SIGNAL && self.registry.mode() == Mode::Remote {
            tracing::debug!(name, "display event ignored in remote mode");
            return Vec::new();
        }

        let Some(sig) = self.registry.signal(name) else {
            tracing::debug!(name, "display event for unknown signal dropped");
            return Vec::new();
        };
        if sig.source != SignalSource::Local {
            tracing::debug!(name, "display event for non-local signal dropped");
            return Vec::new();
        }
        let setter = sig.rpc_setter.clone();
        if setter.as_deref().is_none_or(str::is_empty) && name != MODE_SIGNAL {
            tracing::debug!(name, "display event for signal without rpc setter dropped");
            return Vec::new();
        }

        let Some(delta) = event.value_f64() else {
            tracing::warn!(name, "display event with non-numeric value dropped");
            return Vec::new();
        };
        let current = sig.value;
        let new_value = match event.op.unwrap_or_default() {
            DisplayOp::Add => current.add(delta),
            DisplayOp::Set => SignalValue::coerce(sig.kind, delta),
        };

        // Echo suppression: the display also receives every broadcast, so
        // a no-op write would otherwise storm back and forth. Mode writes
        // always pass, to let the display re-sync its UI.
        if name != MODE_SIGNAL && new_value == current {
            tracing::debug!(name, "redundant display set dropped");
            return Vec::new();
        }

        let mut actions = Vec::new();

        // Optimistic write: the setter call goes out first, but its
        // outcome never blocks the local write. The next telemetry poll
        // corrects any divergence.
        if let Some(function) = setter.filter(|f| !f.is_empty()) {
            actions.push(BridgeAction::CallSetter { function, value: new_value });
        }

        let name = name.to_string();
        self.apply_write(&name, new_value, WriteOrigin::Local, &mut actions);
        actions
    }

    /// Inbound network datagram.
    fn handle_datagram(&mut self, data: &[u8]) -> Vec<BridgeAction> {
        let frame = match SignalFrame::decode(data, &self.key) {
            Ok(frame) => frame,
            Err(err) => {
                // Fail closed: no NACK, no detail on the wire.
                tracing::debug!(%err, "dropping bad datagram");
                return Vec::new();
            },
        };

        let Some(sig) = self.registry.signal_by_id(frame.signal_id()) else {
            tracing::debug!(id = frame.signal_id(), "frame for unknown signal id dropped");
            return Vec::new();
        };
        let name = sig.name.clone();

        // Mirror of the display gate, inverted: network clients are
        // authoritative only in remote mode, mode changes always pass.
        if name != MODE_SIGNAL && self.registry.mode() == Mode::Local {
            tracing::debug!(name, "network write ignored in local mode");
            return Vec::new();
        }

        if frame.ack_code() != ACK_SET {
            tracing::debug!(name, ack = frame.ack_code(), "non-set frame dropped");
            return Vec::new();
        }

        let new_value = SignalValue::coerce(sig.kind, f64::from(frame.value_f32()));
        if name != MODE_SIGNAL && new_value == sig.value {
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.apply_write(&name, new_value, WriteOrigin::Network, &mut actions);
        actions
    }

    /// One successfully polled telemetry word.
    fn handle_telemetry_word(&mut self, word: u64) -> Vec<BridgeAction> {
        let Some(sample) = self.merge.absorb(TelemetryPage::decode(word)) else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        self.apply_write(
            SIG_EXTERN_ENABLE,
            SignalValue::Bool(sample.extern_enable()),
            WriteOrigin::Rpc,
            &mut actions,
        );
        self.apply_write(
            SIG_VOLT_ACT,
            SignalValue::Float(sample.volt()),
            WriteOrigin::Rpc,
            &mut actions,
        );
        self.apply_write(
            SIG_CURR_ACT,
            SignalValue::Float(sample.curr()),
            WriteOrigin::Rpc,
            &mut actions,
        );

        let output = self.registry.get(SIG_INTERNAL_ENABLE).as_bool()
            && self.registry.get(SIG_EXTERN_ENABLE).as_bool();
        self.apply_write(
            SIG_OUTPUT_ENABLE,
            SignalValue::Bool(output),
            WriteOrigin::Logic,
            &mut actions,
        );
        actions
    }

    /// Periodic full-table resynchronization: every signal goes out on
    /// both channels, labeled with its configured source.
    fn full_broadcast(&mut self) -> Vec<BridgeAction> {
        let snapshot: Vec<_> = self
            .registry
            .iter()
            .map(|sig| (sig.name.clone(), sig.id, sig.value, sig.source))
            .collect();

        let mut actions = Vec::with_capacity(snapshot.len() * 2);
        for (name, id, value, source) in snapshot {
            actions.push(BridgeAction::BroadcastFrame(self.sign_frame(id, value)));
            actions.push(BridgeAction::PushDisplay(DisplayRecord::Event(
                DisplayEvent::set_value(&name, value.to_display_json(), source.as_str()),
            )));
        }
        actions
    }

    /// Registry write plus the two propagation side effects on acceptance.
    fn apply_write(
        &mut self,
        name: &str,
        value: SignalValue,
        origin: WriteOrigin,
        actions: &mut Vec<BridgeAction>,
    ) {
        match self.registry.set(name, value, origin) {
            WriteOutcome::Applied(write) => {
                actions.push(BridgeAction::BroadcastFrame(self.sign_frame(write.id, write.value)));
                actions.push(BridgeAction::PushDisplay(DisplayRecord::Event(
                    DisplayEvent::set_value(
                        &write.name,
                        write.value.to_display_json(),
                        write.origin.as_str(),
                    ),
                )));
            },
            WriteOutcome::Unknown | WriteOutcome::Rejected => {},
        }
    }

    /// Encode one freshly-nonced, freshly-signed broadcast frame.
    fn sign_frame(&mut self, id: u8, value: SignalValue) -> [u8; FRAME_LEN] {
        SignalFrame::encode(self.env.nonce(), id, ACK_OK, value.to_wire_bytes(), &self.key)
    }
}
