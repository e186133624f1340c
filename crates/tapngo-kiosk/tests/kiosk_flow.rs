//! End-to-end purchase flows.
//!
//! The machine-only tests feed ticks by hand. The driver tests wire the mock
//! peripherals and the in-memory broker together and run on paused time,
//! stepping the driver at explicit timestamps.

use std::future::Future;
use std::time::Duration;

use tapngo_core::{ClassificationUpdate, ItemLabel, Price, PriceTable, Timestamp};
use tapngo_hardware::mock::{
    MockButtons, MockButtonsHandle, MockCamera, MockCameraHandle, MockCardHandle, MockCardReader,
    MockDisplay, MockDisplayHandle,
};
use tapngo_hardware::{Button, CameraCommand, PeripheralManager, PeripheralSnapshot};
use tapngo_kiosk::{KioskDriver, KioskFault, KioskMachine, KioskState, Trigger};
use tapngo_network::mock::{MockBroker, MockConnector};
use tapngo_network::{
    ChannelError, ChannelSettings, ClassificationChannel, ConnectionState, NetworkLink,
};

const TOPIC: &str = "/predict/classes";

fn at(millis: u64) -> Timestamp {
    Timestamp::from_millis(millis)
}

fn idle() -> PeripheralSnapshot {
    PeripheralSnapshot::idle()
}

fn update(label: &str, millis: u64) -> Option<ClassificationUpdate> {
    Some(ClassificationUpdate::new(
        ItemLabel::new(label).unwrap(),
        at(millis),
    ))
}

/// Drive a fresh machine from Welcome into Processing, entered at `t`.
fn machine_processing_at(t: u64) -> KioskMachine {
    let mut machine = KioskMachine::new();
    machine.tick(idle().with_button(Button::Confirm), None, at(t - 200));
    machine.tick(idle().with_card(), None, at(t - 100));
    let effects = machine.tick(idle().with_button(Button::Start), None, at(t));
    assert_eq!(machine.state(), KioskState::Processing);
    assert_eq!(effects.camera, Some(CameraCommand::Start));
    machine
}

// ============================================================================
// Machine scenarios
// ============================================================================

#[test]
fn test_happy_path_commits_label_after_grace() {
    let mut machine = machine_processing_at(1_000);

    machine.tick(idle(), update("rice-bowl", 2_500), at(2_500));
    assert_eq!(machine.state(), KioskState::Processing);
    assert_eq!(machine.pending_label().map(ItemLabel::as_str), Some("rice-bowl"));

    machine.tick(idle(), None, at(3_000));
    assert_eq!(machine.state(), KioskState::Processing);

    let commit = machine.tick(idle(), None, at(3_100));
    assert_eq!(machine.state(), KioskState::PaymentConfirmation);
    assert_eq!(commit.camera, Some(CameraCommand::Stop));
    assert_eq!(commit.transition.unwrap().trigger, Trigger::LabelReady);
    assert_eq!(machine.context().label().as_str(), "rice-bowl");

    let frame = commit.frame.unwrap();
    assert_eq!(frame.line(0).unwrap().trim_end(), "ITEM: RICE-BOWL");
    assert_eq!(frame.line(2).unwrap().trim_end(), "Harga: Rp15000");

    machine.tick(idle().with_button(Button::Confirm), None, at(3_200));
    assert_eq!(machine.state(), KioskState::PaymentProcessing);

    let paid = machine.tick(idle().with_card(), None, at(3_300));
    assert_eq!(machine.state(), KioskState::PaymentSuccess);
    assert!(paid.frame.unwrap().contains("SUKSES!"));

    machine.tick(idle(), None, at(6_299));
    assert_eq!(machine.state(), KioskState::PaymentSuccess);
    machine.tick(idle(), None, at(6_300));
    assert_eq!(machine.state(), KioskState::Welcome);
    assert_eq!(machine.context().transactions(), 1);
    assert_eq!(machine.history().len(), 7);
}

#[test]
fn test_unknown_item_without_price_is_cancelled() {
    let mut machine = KioskMachine::builder()
        .with_initial_state(KioskState::PaymentConfirmation)
        .with_label(ItemLabel::unknown())
        .starting_at(at(1_000))
        .build();

    let effects = machine.tick(idle(), None, at(1_100));

    assert_eq!(machine.state(), KioskState::PaymentCancelled);
    assert_eq!(
        effects.fault,
        Some(KioskFault::PriceUnavailable {
            label: ItemLabel::unknown()
        })
    );
    assert!(effects.frame.unwrap().contains("DIBATALKAN"));
}

#[test]
fn test_unpriced_label_reports_fault_then_cancels() {
    let prices = PriceTable::new("Rp").with_price(
        ItemLabel::new("bento").unwrap(),
        Price::from_minor(10_000),
    );
    let mut machine = KioskMachine::builder()
        .with_initial_state(KioskState::Processing)
        .with_prices(prices)
        .build();

    machine.tick(idle(), update("rice-bowl", 100), at(100));
    let entering = machine.tick(idle(), None, at(2_100));
    assert_eq!(machine.state(), KioskState::PaymentConfirmation);
    assert!(entering.fault.is_some());
    assert!(entering.frame.unwrap().contains("HARGA TIDAK TERSEDIA"));

    let forced = machine.tick(idle(), None, at(2_200));
    assert_eq!(machine.state(), KioskState::PaymentCancelled);
    assert!(forced.fault.is_none());
    assert_eq!(forced.transition.unwrap().trigger, Trigger::PriceMissing);
}

#[test]
fn test_confirmation_keeps_committed_label() {
    let mut machine = machine_processing_at(1_000);
    machine.tick(idle(), update("bento", 1_500), at(1_500));
    machine.tick(idle(), None, at(3_001));
    assert_eq!(machine.state(), KioskState::PaymentConfirmation);

    machine.tick(idle(), update("rice-bowl", 3_100), at(3_100));
    machine.tick(idle(), update("rice-bowl", 3_200), at(3_200));

    assert_eq!(machine.context().label().as_str(), "bento");
    assert_eq!(machine.context().price(), Some(Price::from_minor(10_000)));
    assert!(machine.render().contains("ITEM: BENTO"));
}

#[test]
fn test_stale_label_from_previous_visit_is_not_committed() {
    let mut machine = KioskMachine::builder()
        .with_initial_state(KioskState::MainMenu)
        .build();

    machine.tick(idle(), update("bento", 50), at(50));
    machine.tick(idle().with_button(Button::Start), None, at(100));
    machine.tick(idle(), None, at(10_000));

    assert_eq!(machine.state(), KioskState::Processing);
    assert!(machine.pending_label().is_none());
}

#[test]
fn test_cancel_returns_to_welcome() {
    let mut machine = machine_processing_at(500);
    machine.tick(idle(), update("bento", 600), at(600));
    machine.tick(idle(), None, at(2_600));
    assert_eq!(machine.state(), KioskState::PaymentConfirmation);

    let cancelled = machine.tick(idle().with_button(Button::Cancel), None, at(2_700));
    assert_eq!(machine.state(), KioskState::PaymentCancelled);
    assert_eq!(cancelled.transition.unwrap().trigger, Trigger::CancelPressed);

    machine.tick(idle(), None, at(5_700));
    assert_eq!(machine.state(), KioskState::Welcome);
    assert_eq!(machine.context().transactions(), 0);
    assert!(machine.render().contains("TAP N GO"));
}

// ============================================================================
// Driver scenarios
// ============================================================================

struct Rig {
    driver: KioskDriver<MockConnector>,
    card: MockCardHandle,
    buttons: MockButtonsHandle,
    display: MockDisplayHandle,
    camera: MockCameraHandle,
    broker: MockBroker,
}

fn rig() -> Rig {
    let (reader, card) = MockCardReader::new();
    let (panel, buttons) = MockButtons::new();
    let (lcd, display) = MockDisplay::new();
    let (trigger, camera) = MockCamera::new();
    let (connector, broker) = MockConnector::new();

    let peripherals = PeripheralManager::new(Box::new(reader), Box::new(panel), Box::new(lcd));
    let channel = ClassificationChannel::new(connector, ChannelSettings::default());
    let driver = KioskDriver::new(KioskMachine::new(), peripherals, Box::new(trigger), channel);

    Rig {
        driver,
        card,
        buttons,
        display,
        camera,
        broker,
    }
}

struct UpLink;

impl NetworkLink for UpLink {
    fn bring_up(&mut self) -> impl Future<Output = tapngo_network::Result<()>> + Send {
        std::future::ready(Ok(()))
    }
}

struct DownLink;

impl NetworkLink for DownLink {
    fn bring_up(&mut self) -> impl Future<Output = tapngo_network::Result<()>> + Send {
        std::future::ready(Err(ChannelError::Transport("no carrier".into())))
    }
}

async fn wait_for_channel(rig: &Rig, state: ConnectionState) {
    let mut rx = rig.driver.channel().subscribe_state();
    tokio::time::timeout(Duration::from_secs(30), rx.wait_for(|s| *s == state))
        .await
        .expect("channel state not reached")
        .expect("channel state sender dropped");
}

async fn wait_for_idle_channel(rig: &Rig) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while rig.driver.channel().is_running() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("channel task did not finish");
}

async fn publish_and_wait(rig: &Rig, label: &str) {
    rig.broker.publish(TOPIC, label);
    tokio::time::timeout(Duration::from_secs(1), async {
        while !rig.driver.channel().mailbox().is_pending() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("label never reached the mailbox");
}

/// Welcome -> AwaitingCard -> MainMenu -> Processing, entered at t=300.
fn walk_to_processing(rig: &mut Rig) {
    rig.buttons.press(Button::Confirm);
    rig.driver.step_at(at(100));
    assert!(rig.display.screen().contains("SILAHKAN TEMPEL"));

    rig.card.tap();
    rig.driver.step_at(at(200));
    assert!(rig.display.screen().contains("TEKAN CONFIRM"));

    rig.buttons.press(Button::Start);
    rig.driver.step_at(at(300));
    assert_eq!(rig.driver.state(), KioskState::Processing);
    assert!(rig.display.screen().contains("MEMPROSES..."));
    assert_eq!(rig.camera.drain(), vec![CameraCommand::Start]);
}

#[tokio::test(start_paused = true)]
async fn test_driver_happy_path() {
    let mut rig = rig();

    assert!(rig.driver.startup(&mut UpLink, Duration::from_secs(1)).await);
    assert!(rig.display.screen().contains("SELAMAT DATANG DI"));
    wait_for_channel(&rig, ConnectionState::Connected).await;

    walk_to_processing(&mut rig);

    publish_and_wait(&rig, "rice-bowl").await;
    rig.driver.step_at(at(1_800));
    assert_eq!(rig.driver.state(), KioskState::Processing);

    rig.driver.step_at(at(2_300));
    assert_eq!(rig.driver.state(), KioskState::Processing);

    rig.driver.step_at(at(2_400));
    assert_eq!(rig.driver.state(), KioskState::PaymentConfirmation);
    assert_eq!(rig.camera.drain(), vec![CameraCommand::Stop]);
    assert!(rig.display.screen().contains("Harga: Rp15000"));

    rig.buttons.press(Button::Confirm);
    rig.driver.step_at(at(2_500));
    assert!(rig.display.screen().contains("UNTUK PEMBAYARAN"));

    rig.card.tap();
    rig.driver.step_at(at(2_600));
    assert_eq!(rig.driver.state(), KioskState::PaymentSuccess);
    assert!(rig.display.screen().contains("SUKSES!"));

    rig.driver.step_at(at(5_599));
    assert_eq!(rig.driver.state(), KioskState::PaymentSuccess);
    rig.driver.step_at(at(5_600));
    assert_eq!(rig.driver.state(), KioskState::Welcome);

    let stats = rig.driver.stats();
    assert_eq!(stats.transitions, 7);
    assert_eq!(stats.labels_taken, 1);
    assert_eq!(stats.camera_commands, 2);
    assert_eq!(stats.faults, 0);
    assert_eq!(rig.driver.machine().context().transactions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_driver_survives_disconnect_mid_processing() {
    let mut rig = rig();
    rig.driver.startup(&mut UpLink, Duration::from_secs(1)).await;
    wait_for_channel(&rig, ConnectionState::Connected).await;
    walk_to_processing(&mut rig);

    rig.broker.drop_sessions();
    wait_for_channel(&rig, ConnectionState::Disconnected).await;
    wait_for_idle_channel(&rig).await;

    // Failure is observed at t=400; nothing is retried before t=2400.
    for t in (400..2_400).step_by(100) {
        rig.driver.step_at(at(t));
        assert_eq!(rig.driver.state(), KioskState::Processing);
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(rig.broker.attempts(), 1);

    let polls_before = rig.driver.peripherals().stats().polls;
    rig.driver.step_at(at(2_400));
    assert_eq!(rig.driver.peripherals().stats().polls, polls_before + 1);
    wait_for_channel(&rig, ConnectionState::Connected).await;
    assert_eq!(rig.broker.connects(), 2);

    publish_and_wait(&rig, "bento").await;
    rig.driver.step_at(at(2_500));
    assert_eq!(rig.driver.state(), KioskState::PaymentConfirmation);
    assert!(rig.display.screen().contains("ITEM: BENTO"));
}

#[tokio::test(start_paused = true)]
async fn test_driver_starts_offline() {
    let mut rig = rig();
    rig.broker.set_reachable(false);

    assert!(!rig.driver.startup(&mut DownLink, Duration::from_secs(1)).await);
    assert!(rig.display.screen().contains("TAP N GO"));

    wait_for_idle_channel(&rig).await;
    assert_eq!(rig.driver.channel().state(), ConnectionState::Disconnected);

    rig.buttons.press(Button::Confirm);
    rig.driver.step_at(at(100));
    assert_eq!(rig.driver.state(), KioskState::AwaitingCard);
}

#[tokio::test(start_paused = true)]
async fn test_peripheral_errors_do_not_stop_the_loop() {
    let mut rig = rig();
    rig.driver.startup(&mut UpLink, Duration::from_secs(1)).await;

    rig.buttons.press(Button::Confirm);
    rig.driver.step_at(at(100));
    assert_eq!(rig.driver.state(), KioskState::AwaitingCard);

    rig.card.fail("crc mismatch");
    let effects = rig.driver.step_at(at(200));
    assert!(effects.is_empty());
    assert_eq!(rig.driver.peripherals().stats().card_errors, 1);

    rig.card.tap();
    rig.driver.step_at(at(300));
    assert_eq!(rig.driver.state(), KioskState::MainMenu);
}

#[tokio::test(start_paused = true)]
async fn test_failed_display_write_is_counted() {
    let mut rig = rig();
    rig.driver.startup(&mut UpLink, Duration::from_secs(1)).await;
    let writes_before = rig.display.screen().writes;

    rig.display.fail_next_write("i2c nack");
    rig.buttons.press(Button::Confirm);
    rig.driver.step_at(at(100));

    assert_eq!(rig.driver.state(), KioskState::AwaitingCard);
    assert_eq!(rig.driver.stats().failed_frames, 1);
    assert_eq!(rig.display.screen().writes, writes_before);

    rig.card.tap();
    rig.driver.step_at(at(200));
    assert!(rig.display.screen().contains("TEKAN CONFIRM"));
}

#[tokio::test(start_paused = true)]
async fn test_run_until_ticks_and_shuts_down() {
    let mut rig = rig();
    rig.driver.startup(&mut UpLink, Duration::from_secs(1)).await;
    rig.buttons.hold(Button::Confirm);

    rig.driver
        .run_until(tokio::time::sleep(Duration::from_millis(1_050)))
        .await;

    let ticks = rig.driver.stats().ticks;
    assert!((10..=11).contains(&ticks), "unexpected tick count {ticks}");
    assert_eq!(rig.driver.state(), KioskState::AwaitingCard);
    assert_eq!(rig.driver.channel().state(), ConnectionState::Disconnected);
}
