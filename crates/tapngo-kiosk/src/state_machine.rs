//! Kiosk state machine.
//!
//! The machine owns the [`StateContext`] and advances it once per tick. It is
//! deterministic: [`KioskMachine::tick`] takes the peripheral snapshot, the
//! label taken from the mailbox (if any) and the current monotonic time, and
//! returns the [`SideEffects`] the driver must apply. It performs no I/O and
//! never reads a clock.
//!
//! # States
//!
//! - `Welcome`: greeting, waits for confirm
//! - `AwaitingCard`: waits for a card tap to start a session
//! - `MainMenu`: asks the customer to place the item and press start
//! - `Processing`: camera running, waits for a classification label
//! - `PaymentConfirmation`: shows item and price, waits for confirm or cancel
//! - `PaymentProcessing`: waits for the card tap that pays
//! - `PaymentSuccess` / `PaymentCancelled`: result screens, auto reset
//!
//! # Valid Transitions
//!
//! - Welcome → AwaitingCard → MainMenu → Processing → PaymentConfirmation
//! - PaymentConfirmation → PaymentProcessing → PaymentSuccess → Welcome
//! - PaymentConfirmation → PaymentCancelled → Welcome
//!
//! # Examples
//!
//! ```
//! use tapngo_hardware::{Button, PeripheralSnapshot};
//! use tapngo_kiosk::{KioskMachine, KioskState};
//! use tapngo_core::Timestamp;
//!
//! let mut machine = KioskMachine::new();
//! assert_eq!(machine.state(), KioskState::Welcome);
//!
//! let effects = machine.tick(
//!     PeripheralSnapshot::idle().with_button(Button::Confirm),
//!     None,
//!     Timestamp::from_millis(100),
//! );
//! assert_eq!(machine.state(), KioskState::AwaitingCard);
//! assert!(effects.frame.is_some());
//! ```
//!
//! # Builder Pattern
//!
//! Starting in an arbitrary state is used for crash recovery and tests:
//!
//! ```
//! use tapngo_kiosk::{KioskMachine, KioskState};
//! use tapngo_core::{ItemLabel, Timestamp};
//!
//! let machine = KioskMachine::builder()
//!     .with_initial_state(KioskState::PaymentConfirmation)
//!     .with_label(ItemLabel::new("bento").unwrap())
//!     .starting_at(Timestamp::from_millis(5_000))
//!     .build();
//!
//! assert_eq!(machine.state(), KioskState::PaymentConfirmation);
//! assert!(machine.context().price().is_some());
//! ```

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tapngo_core::config::TimingConfig;
use tapngo_core::constants::{PROCESSING_GRACE_MS, RESULT_SCREEN_MS};
use tapngo_core::{ClassificationUpdate, ItemLabel, KioskConfig, Price, PriceTable, Result, Timestamp};
use tapngo_hardware::{Button, CameraCommand, PeripheralSnapshot};

use crate::display::{DisplayFrame, ScreenLayout};

/// Maximum number of transitions kept for diagnostics.
///
/// One full purchase is seven transitions, so this covers the last dozen or
/// so customers.
const MAX_HISTORY_SIZE: usize = 100;

/// All states of the kiosk purchase flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KioskState {
    /// Greeting screen.
    Welcome,

    /// Waiting for the customer to tap a card.
    AwaitingCard,

    /// Asking the customer to place the item and press start.
    MainMenu,

    /// Camera streaming, waiting for a classification label.
    Processing,

    /// Item and price on screen, waiting for confirm or cancel.
    PaymentConfirmation,

    /// Waiting for the paying card tap.
    PaymentProcessing,

    /// Payment accepted.
    PaymentSuccess,

    /// Purchase cancelled by the customer or for lack of a price.
    PaymentCancelled,
}

impl fmt::Display for KioskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            KioskState::Welcome => "Welcome",
            KioskState::AwaitingCard => "AwaitingCard",
            KioskState::MainMenu => "MainMenu",
            KioskState::Processing => "Processing",
            KioskState::PaymentConfirmation => "PaymentConfirmation",
            KioskState::PaymentProcessing => "PaymentProcessing",
            KioskState::PaymentSuccess => "PaymentSuccess",
            KioskState::PaymentCancelled => "PaymentCancelled",
        };
        write!(f, "{}", state_str)
    }
}

impl KioskState {
    /// Every state, in flow order.
    pub const ALL: [KioskState; 8] = [
        KioskState::Welcome,
        KioskState::AwaitingCard,
        KioskState::MainMenu,
        KioskState::Processing,
        KioskState::PaymentConfirmation,
        KioskState::PaymentProcessing,
        KioskState::PaymentSuccess,
        KioskState::PaymentCancelled,
    ];

    /// Check if the transition table has an edge from this state to `target`.
    ///
    /// ```
    /// use tapngo_kiosk::KioskState;
    ///
    /// assert!(KioskState::MainMenu.can_transition_to(&KioskState::Processing));
    /// assert!(!KioskState::Welcome.can_transition_to(&KioskState::PaymentSuccess));
    /// ```
    pub fn can_transition_to(&self, target: &KioskState) -> bool {
        matches!(
            (self, target),
            (KioskState::Welcome, KioskState::AwaitingCard)
                | (KioskState::AwaitingCard, KioskState::MainMenu)
                | (KioskState::MainMenu, KioskState::Processing)
                | (KioskState::Processing, KioskState::PaymentConfirmation)
                | (
                    KioskState::PaymentConfirmation,
                    KioskState::PaymentProcessing | KioskState::PaymentCancelled
                )
                | (KioskState::PaymentProcessing, KioskState::PaymentSuccess)
                | (
                    KioskState::PaymentSuccess | KioskState::PaymentCancelled,
                    KioskState::Welcome
                )
        )
    }

    /// Success and cancelled screens, which return to `Welcome` on their own.
    pub fn is_result_screen(&self) -> bool {
        matches!(self, KioskState::PaymentSuccess | KioskState::PaymentCancelled)
    }
}

/// Timing windows of the flow, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KioskTimings {
    /// `Processing` only accepts a label once strictly more than this has
    /// elapsed since entry.
    pub processing_grace_ms: u64,

    /// Result screens return to `Welcome` once at least this has elapsed.
    pub result_screen_ms: u64,
}

impl Default for KioskTimings {
    fn default() -> Self {
        Self {
            processing_grace_ms: PROCESSING_GRACE_MS,
            result_screen_ms: RESULT_SCREEN_MS,
        }
    }
}

impl From<&TimingConfig> for KioskTimings {
    fn from(config: &TimingConfig) -> Self {
        Self {
            processing_grace_ms: config.processing_grace_ms,
            result_screen_ms: config.result_screen_ms,
        }
    }
}

/// Mutable state of one kiosk, owned by [`KioskMachine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateContext {
    state: KioskState,
    since: Timestamp,
    label: ItemLabel,
    price: Option<Price>,
    transactions: u64,
}

impl StateContext {
    /// Fresh context in `Welcome`, entered at `now`.
    pub fn new(now: Timestamp) -> Self {
        Self {
            state: KioskState::Welcome,
            since: now,
            label: ItemLabel::unknown(),
            price: None,
            transactions: 0,
        }
    }

    pub fn state(&self) -> KioskState {
        self.state
    }

    /// When the current state was entered.
    pub fn since(&self) -> Timestamp {
        self.since
    }

    /// Label committed at the last `Processing` exit, or the default label.
    pub fn label(&self) -> &ItemLabel {
        &self.label
    }

    /// Price of the committed label, `None` if the price table has no entry.
    pub fn price(&self) -> Option<Price> {
        self.price
    }

    /// Number of completed purchases since boot.
    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    #[cfg(test)]
    pub(crate) fn set_state_for_test(&mut self, state: KioskState) {
        self.state = state;
    }

    #[cfg(test)]
    pub(crate) fn commit_for_test(&mut self, label: ItemLabel, price: Option<Price>) {
        self.label = label;
        self.price = price;
    }
}

/// What caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    ConfirmPressed,
    StartPressed,
    CancelPressed,
    CardPresented,
    LabelReady,
    PriceMissing,
    ResultTimeout,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trigger_str = match self {
            Trigger::ConfirmPressed => "confirm pressed",
            Trigger::StartPressed => "start pressed",
            Trigger::CancelPressed => "cancel pressed",
            Trigger::CardPresented => "card presented",
            Trigger::LabelReady => "label ready",
            Trigger::PriceMissing => "price missing",
            Trigger::ResultTimeout => "result timeout",
        };
        f.write_str(trigger_str)
    }
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: KioskState,
    pub to: KioskState,
    pub trigger: Trigger,
    pub at: Timestamp,
}

/// Recoverable problems reported through [`SideEffects`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KioskFault {
    /// The committed label has no entry in the price table.
    PriceUnavailable { label: ItemLabel },
}

impl fmt::Display for KioskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KioskFault::PriceUnavailable { label } => {
                write!(f, "no price for item '{label}'")
            }
        }
    }
}

/// Everything the driver must do after a tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideEffects {
    /// The transition taken, if any.
    pub transition: Option<StateTransition>,
    /// Full frame to write, present exactly when a state was entered.
    pub frame: Option<DisplayFrame>,
    pub camera: Option<CameraCommand>,
    pub fault: Option<KioskFault>,
}

impl SideEffects {
    /// `true` if the tick changed nothing.
    pub fn is_empty(&self) -> bool {
        self.transition.is_none()
            && self.frame.is_none()
            && self.camera.is_none()
            && self.fault.is_none()
    }
}

/// The kiosk purchase flow.
#[derive(Debug, Clone)]
pub struct KioskMachine {
    context: StateContext,

    /// Newest label taken while in `Processing`, not yet committed.
    pending: Option<ClassificationUpdate>,

    /// Set once the missing-price fault of the current confirmation has been
    /// reported.
    fault_reported: bool,

    prices: PriceTable,
    timings: KioskTimings,
    layout: ScreenLayout,
    history: VecDeque<StateTransition>,
}

impl Default for KioskMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl KioskMachine {
    /// Machine in `Welcome` at t=0 with default prices, timings and a 4x20
    /// display.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> KioskMachineBuilder {
        KioskMachineBuilder::default()
    }

    /// Machine configured from a loaded [`KioskConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the price table in the configuration is invalid.
    pub fn from_config(config: &KioskConfig) -> Result<Self> {
        Ok(Self::builder()
            .with_prices(config.prices.to_price_table()?)
            .with_timings(KioskTimings::from(&config.timing))
            .with_display_size(config.display.rows, config.display.columns)
            .build())
    }

    pub fn state(&self) -> KioskState {
        self.context.state
    }

    pub fn context(&self) -> &StateContext {
        &self.context
    }

    pub fn timings(&self) -> KioskTimings {
        self.timings
    }

    /// Buffered label waiting for the grace window to close.
    pub fn pending_label(&self) -> Option<&ItemLabel> {
        self.pending.as_ref().map(|update| &update.label)
    }

    /// Frame for the current state.
    pub fn render(&self) -> DisplayFrame {
        self.layout.render(&self.context)
    }

    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// The last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .cloned()
            .collect()
    }

    /// Advance the flow by one tick.
    ///
    /// At most one transition is taken per tick. Inputs with no edge from the
    /// current state are ignored.
    pub fn tick(
        &mut self,
        inputs: PeripheralSnapshot,
        update: Option<ClassificationUpdate>,
        now: Timestamp,
    ) -> SideEffects {
        let mut effects = SideEffects::default();

        if let Some(update) = update {
            self.buffer_label(update);
        }

        let state = self.context.state;
        let dt = now.millis_since(self.context.since);

        if state == KioskState::PaymentConfirmation
            && self.context.price.is_none()
            && !self.fault_reported
        {
            effects.fault = Some(self.price_fault());
            self.fault_reported = true;
        }

        let next = match state {
            KioskState::Welcome if inputs.pressed(Button::Confirm) => {
                Some((KioskState::AwaitingCard, Trigger::ConfirmPressed))
            }
            KioskState::AwaitingCard if inputs.card_present => {
                Some((KioskState::MainMenu, Trigger::CardPresented))
            }
            KioskState::MainMenu if inputs.pressed(Button::Start) => {
                Some((KioskState::Processing, Trigger::StartPressed))
            }
            KioskState::Processing
                if dt > self.timings.processing_grace_ms
                    && self
                        .pending
                        .as_ref()
                        .is_some_and(ClassificationUpdate::is_detection) =>
            {
                Some((KioskState::PaymentConfirmation, Trigger::LabelReady))
            }
            KioskState::PaymentConfirmation if self.context.price.is_none() => {
                Some((KioskState::PaymentCancelled, Trigger::PriceMissing))
            }
            KioskState::PaymentConfirmation if inputs.pressed(Button::Confirm) => {
                Some((KioskState::PaymentProcessing, Trigger::ConfirmPressed))
            }
            KioskState::PaymentConfirmation if inputs.pressed(Button::Cancel) => {
                Some((KioskState::PaymentCancelled, Trigger::CancelPressed))
            }
            KioskState::PaymentProcessing if inputs.card_present => {
                Some((KioskState::PaymentSuccess, Trigger::CardPresented))
            }
            KioskState::PaymentSuccess | KioskState::PaymentCancelled
                if dt >= self.timings.result_screen_ms =>
            {
                Some((KioskState::Welcome, Trigger::ResultTimeout))
            }
            _ => None,
        };

        if let Some((to, trigger)) = next {
            self.enter(to, trigger, now, &mut effects);
        }

        effects
    }

    fn buffer_label(&mut self, update: ClassificationUpdate) {
        if self.context.state != KioskState::Processing {
            debug!(
                label = %update.label,
                state = %self.context.state,
                "label outside processing discarded"
            );
            return;
        }

        debug!(label = %update.label, at = %update.received_at, "label buffered");
        if let Some(replaced) = self.pending.replace(update) {
            debug!(label = %replaced.label, "buffered label replaced");
        }
    }

    fn enter(
        &mut self,
        to: KioskState,
        trigger: Trigger,
        now: Timestamp,
        effects: &mut SideEffects,
    ) {
        let from = self.context.state;
        debug_assert!(
            from.can_transition_to(&to),
            "no edge from {from} to {to}"
        );

        match to {
            KioskState::Welcome => {
                self.context.label = ItemLabel::unknown();
                self.context.price = None;
            }
            KioskState::Processing => {
                self.pending = None;
                effects.camera = Some(CameraCommand::Start);
            }
            KioskState::PaymentConfirmation => {
                self.commit_label();
                effects.camera = Some(CameraCommand::Stop);

                if self.context.price.is_none() {
                    effects.fault = Some(self.price_fault());
                    self.fault_reported = true;
                }
            }
            KioskState::PaymentSuccess => {
                self.context.transactions += 1;
            }
            _ => {}
        }

        self.context.state = to;
        self.context.since = now;

        let transition = StateTransition {
            from,
            to,
            trigger,
            at: now,
        };
        info!(%from, %to, %trigger, %now, "state transition");
        self.record(transition.clone());

        effects.transition = Some(transition);
        effects.frame = Some(self.render());
    }

    fn commit_label(&mut self) {
        let label = self
            .pending
            .take()
            .map(|update| update.label)
            .unwrap_or_default();

        self.context.price = match self.prices.price_of(&label) {
            Ok(price) => Some(price),
            Err(error) => {
                warn!(%error, "committed label has no price");
                None
            }
        };
        self.context.label = label;
        self.fault_reported = false;
    }

    fn price_fault(&self) -> KioskFault {
        KioskFault::PriceUnavailable {
            label: self.context.label.clone(),
        }
    }

    fn record(&mut self, transition: StateTransition) {
        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition);
    }
}

/// Builder for [`KioskMachine`].
#[derive(Debug, Clone, Default)]
pub struct KioskMachineBuilder {
    initial_state: Option<KioskState>,
    label: Option<ItemLabel>,
    prices: Option<PriceTable>,
    timings: Option<KioskTimings>,
    display_size: Option<(usize, usize)>,
    start: Timestamp,
}

impl KioskMachineBuilder {
    /// State to start in instead of `Welcome`.
    pub fn with_initial_state(mut self, state: KioskState) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Committed label to start with. Its price is resolved at build time.
    pub fn with_label(mut self, label: ItemLabel) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn with_timings(mut self, timings: KioskTimings) -> Self {
        self.timings = Some(timings);
        self
    }

    /// Display geometry as `(rows, columns)`.
    pub fn with_display_size(mut self, rows: usize, columns: usize) -> Self {
        self.display_size = Some((rows, columns));
        self
    }

    /// Entry time of the initial state.
    pub fn starting_at(mut self, now: Timestamp) -> Self {
        self.start = now;
        self
    }

    pub fn build(self) -> KioskMachine {
        let prices = self.prices.unwrap_or_default();
        let (rows, columns) = self
            .display_size
            .unwrap_or((ScreenLayout::default().rows(), ScreenLayout::default().columns()));
        let layout = ScreenLayout::new(rows, columns, prices.currency());

        let mut context = StateContext::new(self.start);
        context.state = self.initial_state.unwrap_or(KioskState::Welcome);
        if let Some(label) = self.label {
            context.price = prices.price_of(&label).ok();
            context.label = label;
        }

        KioskMachine {
            context,
            pending: None,
            fault_reported: false,
            prices,
            timings: self.timings.unwrap_or_default(),
            layout,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }
}
