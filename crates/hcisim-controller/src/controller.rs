//! The emulated dual-mode controller.
//!
//! [`Controller`] turns parsed HCI commands into events. It owns the
//! link-layer state machine (standby, inquiry, LE scanning), the host-written
//! configuration that HCI Reset restores, the fake peers it reports during
//! discovery, and the fault injection set through the test channel.
//!
//! Commands and test-channel directives both arrive on the task-manager
//! thread, and so do the delayed callbacks the controller schedules (inquiry
//! completion, periodic discovery). The state mutex is therefore never
//! contended in normal operation; it exists so unit tests may call in from
//! their own thread.
//!
//! No handler holds the state lock while it posts an event or cancels a
//! task. Cancelling a task that is running elsewhere waits for it, and that
//! task may need the lock to finish.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, trace, warn};

use hcisim_async::AsyncManager;
use hcisim_core::address::BdAddr;
use hcisim_core::channel::EventChannel;
use hcisim_core::command::{Command, CommandPacket, ParseError};
use hcisim_core::event::{EventPacket, InquiryResultShape, NUM_HCI_COMMAND_PACKETS};
use hcisim_core::opcode::{self, OpCode};
use hcisim_core::status;
use hcisim_core::task::AsyncTaskId;

use crate::properties::Properties;
use crate::state::{FakePeer, InquiryMode, LinkState, TestChannelState};
use crate::test_commands::{TestCommand, TestCommandError};

/// Time represented by one unit of the Inquiry `inquiry_length` parameter.
pub const INQUIRY_LENGTH_UNIT: Duration = Duration::from_millis(1280);

/// Event mask in effect after reset (7.3.1).
const DEFAULT_EVENT_MASK: u64 = 0x0000_1FFF_FFFF_FFFF;

/// LE event mask in effect after reset (7.8.1).
const DEFAULT_LE_EVENT_MASK: u64 = 0x0000_0000_0000_001F;

/// Most fake peers kept at once; the oldest discovered peer goes first.
pub const MAX_FAKE_PEERS: usize = 64;

/// Scan parameters written by LE Set Scan Parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeScanParameters {
    /// 0x00 passive, 0x01 active.
    pub scan_type: u8,
    pub interval: u16,
    pub window: u16,
    pub own_address_type: u8,
    pub filter_policy: u8,
}

impl Default for LeScanParameters {
    fn default() -> Self {
        LeScanParameters {
            scan_type: 0x00,
            interval: 0x0010,
            window: 0x0010,
            own_address_type: 0x00,
            filter_policy: 0x00,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct State {
    link: LinkState,
    inquiry_mode: InquiryMode,
    event_mask: u64,
    le_event_mask: u64,
    local_name: Vec<u8>,
    class_of_device: [u8; 3],
    scan_enable: u8,
    page_timeout: u16,
    simple_pairing_mode: bool,
    le_host_supported: bool,
    extended_inquiry_response: Vec<u8>,
    le_random_address: BdAddr,
    le_scan: LeScanParameters,
    inquiry_task: AsyncTaskId,
    /// Responses the running inquiry may still report. `None` is unlimited.
    inquiry_responses_left: Option<usize>,

    // Owned by the test channel; HCI Reset leaves these alone.
    test_state: TestChannelState,
    event_delay: Duration,
    peers: Vec<FakePeer>,
    discover_task: AsyncTaskId,
}

impl State {
    fn new(properties: &Properties) -> State {
        State {
            link: LinkState::Standby,
            inquiry_mode: InquiryMode::Standard,
            event_mask: DEFAULT_EVENT_MASK,
            le_event_mask: DEFAULT_LE_EVENT_MASK,
            local_name: properties.local_name().to_vec(),
            class_of_device: properties.class_of_device(),
            scan_enable: 0x00,
            // 5.12 s.
            page_timeout: 0x2000,
            simple_pairing_mode: false,
            le_host_supported: false,
            extended_inquiry_response: Vec::new(),
            le_random_address: BdAddr::default(),
            le_scan: LeScanParameters::default(),
            inquiry_task: AsyncTaskId::INVALID,
            inquiry_responses_left: None,

            test_state: TestChannelState::None,
            event_delay: Duration::ZERO,
            peers: vec![FakePeer::default()],
            discover_task: AsyncTaskId::INVALID,
        }
    }

    /// Restore everything HCI Reset covers.
    fn reset(&mut self, properties: &Properties) {
        let fresh = State::new(properties);
        *self = State {
            test_state: self.test_state,
            event_delay: self.event_delay,
            peers: mem::take(&mut self.peers),
            discover_task: self.discover_task,
            ..fresh
        };
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Handle to the emulated controller. Cloning is cheap.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

struct Inner {
    properties: Properties,
    manager: Arc<AsyncManager>,
    channel: Arc<dyn EventChannel>,
    state: Mutex<State>,
}

impl Controller {
    /// Create a controller in standby that sends its events to `channel`.
    pub fn new(
        properties: Properties,
        manager: Arc<AsyncManager>,
        channel: Arc<dyn EventChannel>,
    ) -> Controller {
        let state = State::new(&properties);
        Controller {
            inner: Arc::new(Inner {
                properties,
                manager,
                channel,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.inner.properties
    }

    pub fn link_state(&self) -> LinkState {
        self.state().link
    }

    pub fn inquiry_mode(&self) -> InquiryMode {
        self.state().inquiry_mode
    }

    pub fn test_channel_state(&self) -> TestChannelState {
        self.state().test_state
    }

    /// Delay applied to every event while in [`TestChannelState::DelayedResponse`].
    pub fn event_delay(&self) -> Duration {
        self.state().event_delay
    }

    pub fn local_name(&self) -> Vec<u8> {
        self.state().local_name.clone()
    }

    pub fn le_scan_parameters(&self) -> LeScanParameters {
        self.state().le_scan
    }

    pub fn peers(&self) -> Vec<FakePeer> {
        self.state().peers.clone()
    }

    /// Cancel the inquiry completion and periodic discovery, if scheduled.
    pub fn cancel_pending_tasks(&self) {
        let (inquiry, discover) = {
            let mut state = self.state();
            (
                mem::take(&mut state.inquiry_task),
                mem::take(&mut state.discover_task),
            )
        };
        self.inner.manager.cancel_async_task(inquiry);
        self.inner.manager.cancel_async_task(discover);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Controller> {
        weak.upgrade().map(|inner| Controller { inner })
    }

    // -----------------------------------------------------------------------
    // Event output
    // -----------------------------------------------------------------------

    /// Post one event, honoring an injected event delay.
    fn send_event(&self, event: EventPacket) {
        let delay = {
            let state = self.state();
            match state.test_state {
                TestChannelState::DelayedResponse => state.event_delay,
                _ => Duration::ZERO,
            }
        };
        trace!(
            event_code = event.event_code(),
            delay_ms = delay.as_millis() as u64,
            "posting event"
        );
        if delay.is_zero() {
            self.inner.channel.post_event(event);
        } else {
            self.inner.channel.post_delayed_event(event, delay);
        }
    }

    fn complete(&self, opcode: OpCode, status: u8) {
        self.send_event(EventPacket::command_complete_only_status(opcode, status));
    }

    fn complete_with(&self, opcode: OpCode, return_params: &[u8]) {
        self.send_event(EventPacket::command_complete(
            NUM_HCI_COMMAND_PACKETS,
            opcode,
            return_params,
        ));
    }

    // -----------------------------------------------------------------------
    // HCI commands
    // -----------------------------------------------------------------------

    /// Handle one command frame from the host.
    ///
    /// Unsupported opcodes are dropped without a reply, like a controller
    /// that never heard them. Malformed parameters are answered with
    /// `INVALID_PARAMETERS`.
    pub fn handle_command(&self, packet: CommandPacket) {
        let opcode = packet.opcode();
        if self.test_channel_state() == TestChannelState::TimeoutAll {
            debug!(opcode = %opcode, "TIMEOUT_ALL active; command swallowed");
            return;
        }

        let command = match Command::parse(&packet) {
            Ok(command) => command,
            Err(ParseError::UnknownOpcode(_)) => {
                debug!(opcode = %opcode, "unsupported opcode; ignored");
                return;
            }
            Err(e) => {
                warn!(opcode = %opcode, error = %e, "rejecting command");
                self.complete(opcode, status::INVALID_PARAMETERS);
                return;
            }
        };

        debug!(opcode = %opcode, command = command.name(), "controller performing command");
        self.dispatch(opcode, command);
    }

    fn dispatch(&self, opcode: OpCode, command: Command) {
        let props = &self.inner.properties;
        match command {
            // Link Control
            Command::Inquiry {
                inquiry_length,
                num_responses,
                ..
            } => self.inquiry(inquiry_length, num_responses),
            Command::InquiryCancel => self.inquiry_cancel(),
            Command::RemoteNameRequest { bd_addr, .. } => self.remote_name_request(bd_addr),

            // Controller & Baseband
            Command::Reset => self.reset(),
            Command::SetEventMask { mask } => {
                self.state().event_mask = mask;
                self.complete(opcode, status::SUCCESS);
            }
            Command::DeleteStoredLinkKey { .. } => {
                // No keys are ever stored: num_keys_deleted is zero.
                self.complete_with(opcode, &[status::SUCCESS, 0x00, 0x00]);
            }
            Command::WriteLocalName { name } => {
                self.state().local_name = name;
                self.complete(opcode, status::SUCCESS);
            }
            Command::ReadLocalName => {
                let name = self.local_name();
                self.send_event(EventPacket::read_local_name(status::SUCCESS, &name));
            }
            Command::WritePageTimeout { timeout } => {
                self.state().page_timeout = timeout;
                self.complete(opcode, status::SUCCESS);
            }
            Command::WriteScanEnable { scan_enable } => {
                self.state().scan_enable = scan_enable;
                self.complete(opcode, status::SUCCESS);
            }
            Command::WriteClassOfDevice { class_of_device } => {
                self.state().class_of_device = class_of_device;
                self.complete(opcode, status::SUCCESS);
            }
            Command::WriteInquiryMode { mode } => match InquiryMode::try_from(mode) {
                Ok(mode) => {
                    self.state().inquiry_mode = mode;
                    self.complete(opcode, status::SUCCESS);
                }
                Err(_) => self.complete(opcode, status::INVALID_PARAMETERS),
            },
            Command::WriteExtendedInquiryResponse { data, .. } => {
                self.state().extended_inquiry_response = data;
                self.complete(opcode, status::SUCCESS);
            }
            Command::WriteSimplePairingMode { enabled } => {
                self.state().simple_pairing_mode = enabled;
                self.complete(opcode, status::SUCCESS);
            }
            Command::WriteLeHostSupport { le_supported, .. } => {
                self.state().le_host_supported = le_supported;
                self.complete(opcode, status::SUCCESS);
            }
            Command::WriteDefaultLinkPolicySettings { .. }
            | Command::SetEventFilter { .. }
            | Command::WriteInquiryScanActivity { .. }
            | Command::WriteVoiceSetting { .. }
            | Command::HostBufferSize { .. }
            | Command::WriteCurrentIacLap { .. }
            | Command::WriteInquiryScanType { .. }
            | Command::WritePageScanType { .. } => self.complete(opcode, status::SUCCESS),

            // Informational
            Command::ReadLocalVersionInformation => {
                self.send_event(EventPacket::read_local_version_information(
                    status::SUCCESS,
                    props.hci_version(),
                    props.hci_revision(),
                    props.lmp_version(),
                    props.manufacturer_name(),
                    props.lmp_subversion(),
                ))
            }
            Command::ReadLocalSupportedCommands => self.send_event(
                EventPacket::read_local_supported_commands(
                    status::SUCCESS,
                    props.supported_commands(),
                ),
            ),
            Command::ReadLocalSupportedFeatures => self.send_event(
                EventPacket::read_local_supported_features(
                    status::SUCCESS,
                    props.supported_features(),
                ),
            ),
            Command::ReadLocalExtendedFeatures { page_number } => {
                let (status, features) = match props.extended_features(page_number) {
                    Some(features) => (status::SUCCESS, features),
                    None => (status::INVALID_PARAMETERS, 0),
                };
                self.send_event(EventPacket::read_local_extended_features(
                    status,
                    page_number,
                    props.max_feature_page(),
                    features,
                ));
            }
            Command::ReadBufferSize => self.send_event(EventPacket::read_buffer_size(
                status::SUCCESS,
                props.acl_data_packet_length(),
                props.sco_data_packet_length(),
                props.total_num_acl_data_packets(),
                props.total_num_sco_data_packets(),
            )),
            Command::ReadBdAddr => {
                self.send_event(EventPacket::read_bd_addr(status::SUCCESS, props.bd_addr()))
            }
            Command::ReadLocalSupportedCodecs => {
                self.send_event(EventPacket::read_local_supported_codecs(
                    status::SUCCESS,
                    props.supported_codecs(),
                    props.vendor_specific_codecs(),
                ))
            }

            // LE Controller
            Command::LeSetEventMask { mask } => {
                self.state().le_event_mask = mask;
                self.complete(opcode, status::SUCCESS);
            }
            Command::LeReadBufferSize => self.send_event(EventPacket::le_read_buffer_size(
                status::SUCCESS,
                props.le_data_packet_length(),
                props.total_num_le_data_packets(),
            )),
            Command::LeReadLocalSupportedFeatures => self.send_event(
                EventPacket::le_read_local_supported_features(
                    status::SUCCESS,
                    props.le_supported_features(),
                ),
            ),
            Command::LeSetRandomAddress { address } => {
                self.state().le_random_address = address;
                self.complete(opcode, status::SUCCESS);
            }
            Command::LeSetScanParameters {
                scan_type,
                interval,
                window,
                own_address_type,
                filter_policy,
            } => {
                let accepted = {
                    let mut state = self.state();
                    if state.link == LinkState::Scanning {
                        false
                    } else {
                        state.le_scan = LeScanParameters {
                            scan_type,
                            interval,
                            window,
                            own_address_type,
                            filter_policy,
                        };
                        true
                    }
                };
                let status = if accepted {
                    status::SUCCESS
                } else {
                    status::COMMAND_DISALLOWED
                };
                self.complete(opcode, status);
            }
            Command::LeSetScanEnable { enable, .. } => self.le_set_scan_enable(enable),
            Command::LeReadWhiteListSize => self.send_event(EventPacket::le_read_white_list_size(
                status::SUCCESS,
                props.le_white_list_size(),
            )),
            Command::LeRand => {
                let random = rand::thread_rng().r#gen::<u64>();
                self.send_event(EventPacket::le_rand(status::SUCCESS, random));
            }
            Command::LeReadSupportedStates => self.send_event(
                EventPacket::le_read_supported_states(status::SUCCESS, props.le_supported_states()),
            ),

            // Vendor specific
            Command::VendorSleepMode { .. } | Command::VendorLeExtendedScanParams { .. } => {
                self.complete(opcode, status::SUCCESS)
            }
            Command::VendorLeGetCapabilities => self.send_event(
                EventPacket::le_vendor_capabilities(
                    status::SUCCESS,
                    props.le_vendor_capabilities(),
                ),
            ),
            Command::VendorLeMultiAdvertising { subcommand, .. }
            | Command::VendorLeRpaOffload { subcommand, .. } => {
                self.complete_with(opcode, &[status::SUCCESS, subcommand]);
            }
            Command::VendorLeAdvFilter { subcommand, params } => {
                let action = params.first().copied().unwrap_or(0);
                let available = props.le_vendor_capabilities().get(5).copied().unwrap_or(0);
                self.complete_with(opcode, &[status::SUCCESS, subcommand, action, available]);
            }
            Command::VendorLeEnergyInfo => {
                // tx_time, rx_time, idle_time, energy_used: all zero.
                let mut params = [0u8; 17];
                params[0] = status::SUCCESS;
                self.complete_with(opcode, &params);
            }
        }
    }

    fn reset(&self) {
        let inquiry = {
            let mut state = self.state();
            let task = mem::take(&mut state.inquiry_task);
            state.reset(&self.inner.properties);
            task
        };
        if self.inner.manager.cancel_async_task(inquiry) {
            debug!(task_id = %inquiry, "pending inquiry completion cancelled by reset");
        }
        self.complete(opcode::RESET, status::SUCCESS);
    }

    fn inquiry(&self, inquiry_length: u8, num_responses: u8) {
        let started = {
            let mut state = self.state();
            if state.link == LinkState::Scanning {
                None
            } else {
                state.link = LinkState::Inquiry;
                let limit = match num_responses {
                    0 => state.peers.len(),
                    n => usize::from(n).min(state.peers.len()),
                };
                state.inquiry_responses_left = match num_responses {
                    0 => None,
                    n => Some(usize::from(n) - limit),
                };
                let peers = state.peers[..limit].to_vec();
                Some((mem::take(&mut state.inquiry_task), peers))
            }
        };
        let Some((previous, peers)) = started else {
            self.send_event(EventPacket::command_status(
                status::COMMAND_DISALLOWED,
                opcode::INQUIRY,
            ));
            return;
        };
        self.inner.manager.cancel_async_task(previous);

        self.send_event(EventPacket::command_status(status::SUCCESS, opcode::INQUIRY));

        self.report_inquiry_results(&peers);

        let delay = INQUIRY_LENGTH_UNIT * u32::from(inquiry_length);
        let weak = self.downgrade();
        let task = self.inner.manager.exec_async(delay, move || {
            if let Some(controller) = Controller::upgrade(&weak) {
                controller.complete_inquiry();
            }
        });
        self.state().inquiry_task = task;
        debug!(
            task_id = %task,
            delay_ms = delay.as_millis() as u64,
            "inquiry complete scheduled"
        );
    }

    fn complete_inquiry(&self) {
        {
            let mut state = self.state();
            if state.link != LinkState::Inquiry {
                return;
            }
            state.link = LinkState::Standby;
            state.inquiry_task = AsyncTaskId::INVALID;
        }
        debug!("inquiry complete");
        self.send_event(EventPacket::inquiry_complete(status::SUCCESS));
    }

    fn inquiry_cancel(&self) {
        let pending = {
            let mut state = self.state();
            if state.link == LinkState::Inquiry {
                state.link = LinkState::Standby;
                Some(mem::take(&mut state.inquiry_task))
            } else {
                None
            }
        };
        match pending {
            Some(task) => {
                self.inner.manager.cancel_async_task(task);
                self.complete(opcode::INQUIRY_CANCEL, status::SUCCESS);
            }
            None => self.complete(opcode::INQUIRY_CANCEL, status::COMMAND_DISALLOWED),
        }
    }

    /// Emit the inquiry result events for `peers` in the current inquiry
    /// mode.
    fn report_inquiry_results(&self, peers: &[FakePeer]) {
        let shape = match self.inquiry_mode() {
            InquiryMode::Standard => InquiryResultShape::Standard,
            InquiryMode::Rssi => InquiryResultShape::WithRssi,
            InquiryMode::Extended => {
                for peer in peers {
                    self.send_event(EventPacket::extended_inquiry_result(
                        &peer.inquiry_result(),
                        &peer.extended_inquiry_response(),
                    ));
                }
                return;
            }
        };
        let results: Vec<_> = peers.iter().map(FakePeer::inquiry_result).collect();
        for event in EventPacket::inquiry_result(shape, &results) {
            self.send_event(event);
        }
    }

    fn remote_name_request(&self, bd_addr: BdAddr) {
        self.send_event(EventPacket::command_status(
            status::SUCCESS,
            opcode::REMOTE_NAME_REQUEST,
        ));
        let peer = self
            .state()
            .peers
            .iter()
            .find(|peer| peer.address == bd_addr)
            .cloned();
        let event = match peer {
            Some(peer) => {
                EventPacket::remote_name_request_complete(status::SUCCESS, bd_addr, &peer.name)
            }
            None => {
                debug!(%bd_addr, "remote name request for unknown peer");
                EventPacket::remote_name_request_complete(status::PAGE_TIMEOUT, bd_addr, &[])
            }
        };
        self.send_event(event);
    }

    fn le_set_scan_enable(&self, enable: bool) {
        let outcome = {
            let mut state = self.state();
            match (enable, state.link) {
                (true, LinkState::Inquiry) => None,
                (true, _) => {
                    state.link = LinkState::Scanning;
                    Some(state.peers.clone())
                }
                (false, LinkState::Scanning) => {
                    state.link = LinkState::Standby;
                    Some(Vec::new())
                }
                (false, _) => Some(Vec::new()),
            }
        };
        let Some(peers) = outcome else {
            self.complete(opcode::LE_SET_SCAN_ENABLE, status::COMMAND_DISALLOWED);
            return;
        };
        self.complete(opcode::LE_SET_SCAN_ENABLE, status::SUCCESS);
        for peer in peers {
            self.send_event(EventPacket::le_advertising_report(&[peer.advertising_report()]));
        }
    }

    // -----------------------------------------------------------------------
    // Test channel
    // -----------------------------------------------------------------------

    /// Handle one directive from the test channel. Unknown names and bad
    /// arguments are logged and ignored.
    pub fn handle_test_command(&self, name: &str, args: &[String]) {
        match TestCommand::from_directive(name, args) {
            Ok(command) => self.apply_test_command(command),
            Err(TestCommandError::Unknown(name)) => {
                debug!(%name, "unknown test command; ignored");
            }
            Err(e) => warn!(error = %e, "test command ignored"),
        }
    }

    pub fn apply_test_command(&self, command: TestCommand) {
        info!(command = command.name(), "test channel command");
        match command {
            TestCommand::Clear => {
                let discover = {
                    let mut state = self.state();
                    state.test_state = TestChannelState::None;
                    state.event_delay = Duration::ZERO;
                    state.peers = vec![FakePeer::default()];
                    mem::take(&mut state.discover_task)
                };
                self.inner.manager.cancel_async_task(discover);
            }
            TestCommand::SetEventDelay(delay) => {
                let mut state = self.state();
                state.test_state = TestChannelState::DelayedResponse;
                state.event_delay = delay;
            }
            TestCommand::ClearEventDelay => {
                let mut state = self.state();
                if state.test_state == TestChannelState::DelayedResponse {
                    state.test_state = TestChannelState::None;
                }
                state.event_delay = Duration::ZERO;
            }
            TestCommand::TimeoutAll => {
                self.state().test_state = TestChannelState::TimeoutAll;
            }
            TestCommand::Discover(names) => {
                if names.is_empty() {
                    self.add_peer(random_peer(None));
                }
                for name in names {
                    self.add_peer(random_peer(Some(name)));
                }
            }
            TestCommand::DiscoverInterval(period) => {
                let previous = mem::take(&mut self.state().discover_task);
                self.inner.manager.cancel_async_task(previous);
                let weak = self.downgrade();
                let task = self
                    .inner
                    .manager
                    .exec_async_periodically(period, period, move || {
                        if let Some(controller) = Controller::upgrade(&weak) {
                            controller.add_peer(random_peer(None));
                        }
                    });
                self.state().discover_task = task;
            }
        }
    }

    /// Make `peer` visible. It is reported right away if an LE scan is
    /// running, or an inquiry that has not yet reached its response limit.
    ///
    /// At most [`MAX_FAKE_PEERS`] are kept; adding one more forgets the
    /// oldest.
    pub fn add_peer(&self, peer: FakePeer) {
        let link = {
            let mut guard = self.state();
            let state = &mut *guard;
            if state.peers.len() >= MAX_FAKE_PEERS {
                let dropped = state.peers.remove(0);
                debug!(address = %dropped.address, "fake peer limit reached; oldest forgotten");
            }
            state.peers.push(peer.clone());
            let report = match (state.link, &mut state.inquiry_responses_left) {
                (LinkState::Standby, _) | (LinkState::Inquiry, Some(0)) => false,
                (LinkState::Inquiry, Some(left)) => {
                    *left -= 1;
                    true
                }
                (LinkState::Inquiry, None) | (LinkState::Scanning, _) => true,
            };
            report.then_some(state.link)
        };
        info!(
            address = %peer.address,
            name = %String::from_utf8_lossy(&peer.name),
            "fake peer discovered"
        );
        match link {
            Some(LinkState::Inquiry) => self.report_inquiry_results(std::slice::from_ref(&peer)),
            Some(LinkState::Scanning) => {
                self.send_event(EventPacket::le_advertising_report(&[peer.advertising_report()]))
            }
            Some(LinkState::Standby) | None => {}
        }
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Controller")
            .field("bd_addr", &self.inner.properties.bd_addr())
            .field("link", &state.link)
            .field("test_state", &state.test_state)
            .field("peers", &state.peers.len())
            .finish()
    }
}

/// A peer with a random address, and a random name unless one is given.
fn random_peer(name: Option<String>) -> FakePeer {
    let mut rng = rand::thread_rng();
    let address = BdAddr(rng.r#gen());
    let name = name.unwrap_or_else(|| format!("hcisim-{:04X}", rng.r#gen::<u16>()));
    FakePeer {
        rssi: rng.gen_range(-90..=-30),
        ..FakePeer::new(address, name.into_bytes())
    }
}
