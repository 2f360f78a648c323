//! End-to-end scenarios: engine, simulated peripheral and slaves together

use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource, Operation};

use fastwire_core::observer::{DebugEvent, DebugFilter, DebugStatus};
use fastwire_core::stepper::BusPhase;
use fastwire_core::{
    BlockingI2c, DebugRecorder, ErrorPolicy, Future, FutureId, FutureListener, FutureStatus,
    FuturesGroup, GroupMember, I2cCallback, I2cDevice, I2cError, I2cFinish, I2cManager,
    LatestStatus, ManagerConfig, NoObserver, ReadRegisterFuture, RegisterWrites,
    WriteRegisterFuture,
};
use fastwire_hal::TwiStatus;

use crate::bus::{BusEvent, SimBus, SimTwi};
use crate::isr::{run_isr, run_until_idle, run_until_idle_with};
use crate::slave::RegisterSlave;

type SimManager<'b, O = NoObserver> = I2cManager<SimTwi<'b>, O, 8, 4>;

fn manager(bus: &SimBus, config: ManagerConfig) -> SimManager<'_> {
    let manager = I2cManager::new(bus.twi(), config);
    manager.begin();
    manager
}

fn address(address: u8, read: bool, ack: bool) -> BusEvent {
    BusEvent::Address { address, read, ack }
}

#[test]
fn test_read_register_end_to_end() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x77).with_register(0x35, 0x23));
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x77).unwrap();

    let mut future = ReadRegisterFuture::<u8>::new(0x35);
    device.read_register(&mut future).unwrap();
    assert_eq!(future.status(), FutureStatus::NotReady);

    let stats = run_until_idle(&manager);
    assert_eq!(stats.transactions, 1);
    assert_eq!(future.status(), FutureStatus::Ready);
    assert_eq!(future.get(), Some(0x23));
    assert_eq!(future.status(), FutureStatus::Invalid);

    assert_eq!(
        bus.log(),
        vec![
            BusEvent::Start,
            address(0x77, false, true),
            BusEvent::Write { byte: 0x35, ack: true },
            BusEvent::RepeatStart,
            address(0x77, true, true),
            BusEvent::Read { byte: 0x23, ack: false },
            BusEvent::Stop,
        ]
    );
    assert!(manager.is_idle());
}

#[test]
fn test_empty_write_completes_after_address() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x20));
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x20).unwrap();

    let mut future: Future<'_> = Future::new(());
    device
        .launch_commands(&mut future, &[I2cDevice::write(0, I2cFinish::FUTURE_FINISH)])
        .unwrap();
    run_until_idle(&manager);

    assert_eq!(future.status(), FutureStatus::Ready);
    assert_eq!(future.get(), Some(()));
    assert_eq!(
        bus.log(),
        vec![BusEvent::Start, address(0x20, false, true), BusEvent::Stop]
    );
}

#[test]
fn test_multi_byte_read_in_order() {
    let bus = SimBus::new();
    bus.attach(
        RegisterSlave::new(0x50)
            .with_register(0x10, 1)
            .with_register(0x11, 2)
            .with_register(0x12, 3)
            .with_register(0x13, 4),
    );
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut future = ReadRegisterFuture::<[u8; 4]>::new(0x10);
    device.read_register(&mut future).unwrap();
    run_until_idle(&manager);
    assert_eq!(future.get(), Some([1, 2, 3, 4]));

    let acks: Vec<bool> = bus
        .log()
        .into_iter()
        .filter_map(|event| match event {
            BusEvent::Read { ack, .. } => Some(ack),
            _ => None,
        })
        .collect();
    assert_eq!(acks, vec![true, true, true, false]);
}

#[test]
fn test_big_endian_register() {
    let bus = SimBus::new();
    bus.attach(
        RegisterSlave::new(0x50)
            .with_register(0x00, 0x12)
            .with_register(0x01, 0x34),
    );
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut future = ReadRegisterFuture::<u16>::new(0x00);
    device.read_register(&mut future).unwrap();
    run_until_idle(&manager);
    assert_eq!(future.get(), Some(0x1234));
}

#[test]
fn test_write_register() {
    let bus = SimBus::new();
    let slave = RegisterSlave::new(0x50);
    let registers = slave.registers();
    bus.attach(slave);
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut future = WriteRegisterFuture::new((0x20u8, 0xBEEFu16));
    device.write_register(&mut future).unwrap();
    run_until_idle(&manager);
    assert_eq!(future.status(), FutureStatus::Ready);
    assert_eq!(registers.get(0x20), 0xBE);
    assert_eq!(registers.get(0x21), 0xEF);
}

#[test]
fn test_address_nack_clears_all_commands() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x51));
    let manager = manager(&bus, ManagerConfig::default());
    let missing = I2cDevice::new(&manager, 0x50).unwrap();
    let present = I2cDevice::new(&manager, 0x51).unwrap();

    let mut first = ReadRegisterFuture::<u8>::new(0x00);
    let mut second = ReadRegisterFuture::<u8>::new(0x00);
    missing.read_register(&mut first).unwrap();
    present.read_register(&mut second).unwrap();

    let stats = run_until_idle(&manager);
    assert_eq!(stats.errors, 1);
    assert_eq!(first.status(), FutureStatus::Error);
    assert_eq!(first.error(), Some(I2cError::AddressNack));
    assert_eq!(first.error().map(I2cError::errno), Some(-71));
    assert_eq!(second.error(), Some(I2cError::Cancelled));
    assert!(manager.is_idle());
    assert_eq!(manager.queue_free(), 8);
    assert_eq!(manager.phase(), BusPhase::Error);
    assert_eq!(
        bus.log(),
        vec![BusEvent::Start, address(0x50, false, false), BusEvent::Stop]
    );
}

#[test]
fn test_clear_transaction_keeps_next_transaction() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x51).with_register(0x07, 0x42));
    let config = ManagerConfig::default().with_policy(ErrorPolicy::ClearTransactionCommands);
    let manager = manager(&bus, config);
    let missing = I2cDevice::new(&manager, 0x50).unwrap();
    let present = I2cDevice::new(&manager, 0x51).unwrap();

    let mut first = ReadRegisterFuture::<u8>::new(0x07);
    let mut second = ReadRegisterFuture::<u8>::new(0x07);
    missing.read_register(&mut first).unwrap();
    present.read_register(&mut second).unwrap();
    run_until_idle(&manager);

    assert_eq!(first.error(), Some(I2cError::AddressNack));
    assert_eq!(second.get(), Some(0x42));
    assert_eq!(manager.phase(), BusPhase::Idle);
}

#[test]
fn test_do_nothing_runs_remaining_commands() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x51).with_register(0x07, 0x42));
    let config = ManagerConfig::default().with_policy(ErrorPolicy::DoNothing);
    let manager = manager(&bus, config);
    let missing = I2cDevice::new(&manager, 0x50).unwrap();
    let present = I2cDevice::new(&manager, 0x51).unwrap();

    let mut first = ReadRegisterFuture::<u8>::new(0x07);
    let mut second = ReadRegisterFuture::<u8>::new(0x07);
    missing.read_register(&mut first).unwrap();
    present.read_register(&mut second).unwrap();
    let stats = run_until_idle(&manager);

    // Both commands of the first transaction hit the missing device
    assert_eq!(stats.errors, 2);
    assert_eq!(first.error(), Some(I2cError::AddressNack));
    assert_eq!(second.get(), Some(0x42));
    let nacked = bus
        .log()
        .iter()
        .filter(|event| matches!(event, BusEvent::Address { ack: false, .. }))
        .count();
    assert_eq!(nacked, 2);
}

#[test]
fn test_force_stop_between_commands() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x50).with_register(0x01, 0x99));
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut future = ReadRegisterFuture::<u8>::new(0x01);
    device
        .launch_commands(
            &mut future,
            &[
                I2cDevice::write(0, I2cFinish::FORCE_STOP),
                I2cDevice::read(0, I2cFinish::empty()),
            ],
        )
        .unwrap();
    run_until_idle(&manager);

    assert_eq!(future.get(), Some(0x99));
    assert_eq!(
        bus.log(),
        vec![
            BusEvent::Start,
            address(0x50, false, true),
            BusEvent::Write { byte: 0x01, ack: true },
            BusEvent::Stop,
            BusEvent::Start,
            address(0x50, true, true),
            BusEvent::Read { byte: 0x99, ack: false },
            BusEvent::Stop,
        ]
    );
}

#[test]
fn test_transactions_chain_with_repeat_start() {
    let bus = SimBus::new();
    bus.attach(
        RegisterSlave::new(0x50)
            .with_register(0x01, 0x11)
            .with_register(0x02, 0x22),
    );
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut first = ReadRegisterFuture::<u8>::new(0x01);
    let mut second = ReadRegisterFuture::<u8>::new(0x02);
    device.read_register(&mut first).unwrap();
    device.read_register(&mut second).unwrap();
    let stats = run_until_idle(&manager);

    assert_eq!(stats.transactions, 2);
    assert_eq!(first.get(), Some(0x11));
    assert_eq!(second.get(), Some(0x22));
    let log = bus.log();
    let count = |wanted: BusEvent| log.iter().filter(|&&event| event == wanted).count();
    assert_eq!(count(BusEvent::Start), 1);
    assert_eq!(count(BusEvent::RepeatStart), 3);
    assert_eq!(count(BusEvent::Stop), 1);
}

#[test]
fn test_early_finish_with_missing_output() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x50));
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut future = ReadRegisterFuture::<u8>::new(0x01);
    device
        .launch_commands(
            &mut future,
            &[
                I2cDevice::write(0, I2cFinish::FUTURE_FINISH),
                I2cDevice::read(0, I2cFinish::empty()),
            ],
        )
        .unwrap();
    run_until_idle(&manager);
    assert_eq!(future.error(), Some(I2cError::IllegalSequence));
}

#[test]
fn test_data_nack() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x50).nack_data_after(1));
    bus.attach(RegisterSlave::new(0x51).nack_data_after(3));
    let manager = manager(&bus, ManagerConfig::default());

    let mut early = WriteRegisterFuture::new((0x00u8, 0x0102u16));
    I2cDevice::new(&manager, 0x50)
        .unwrap()
        .write_register(&mut early)
        .unwrap();
    run_until_idle(&manager);
    assert_eq!(early.error(), Some(I2cError::DataNack));

    // NACK on the very last byte is accepted
    let mut last = WriteRegisterFuture::new((0x00u8, 0x0102u16));
    I2cDevice::new(&manager, 0x51)
        .unwrap()
        .write_register(&mut last)
        .unwrap();
    run_until_idle(&manager);
    assert_eq!(last.status(), FutureStatus::Ready);
}

#[test]
fn test_arbitration_lost() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x50));
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    bus.inject_status(TwiStatus::ARBITRATION_LOST);
    let mut future = ReadRegisterFuture::<u8>::new(0x01);
    device.read_register(&mut future).unwrap();
    run_until_idle(&manager);
    assert_eq!(future.error(), Some(I2cError::ArbitrationLost));
}

#[test]
fn test_reset_relaunches_with_same_id() {
    let bus = SimBus::new();
    bus.attach(
        RegisterSlave::new(0x50)
            .with_register(0x01, 0x11)
            .with_register(0x02, 0x22),
    );
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut future = ReadRegisterFuture::<u8>::new(0x01);
    device.read_register(&mut future).unwrap();
    let id = future.id();
    assert_eq!(future.reset_(0x02), Err(I2cError::Busy));
    run_until_idle(&manager);
    assert_eq!(future.get(), Some(0x11));

    // Completed and consumed: a second launch needs a reset
    assert_eq!(device.read_register(&mut future), Err(I2cError::Invalid));

    future.reset_(0x02).unwrap();
    assert_eq!(future.status(), FutureStatus::NotReady);
    device.read_register(&mut future).unwrap();
    assert_eq!(future.id(), id);
    run_until_idle(&manager);
    assert_eq!(future.get(), Some(0x22));
    assert_eq!(manager.available_futures(), 3);
}

#[test]
fn test_drop_in_flight_reclaims_slot_later() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x50));
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut future = ReadRegisterFuture::<u8>::new(0x01);
    device.read_register(&mut future).unwrap();
    drop(future);
    assert_eq!(manager.available_futures(), 3);

    run_until_idle(&manager);
    assert_eq!(manager.available_futures(), 4);
}

#[test]
fn test_future_moved_while_in_flight() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x50).with_register(0x07, 0x5A));
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut future = ReadRegisterFuture::<u8>::new(0x07);
    device.read_register(&mut future).unwrap();
    let id = future.id();
    let boxed = Box::new(future);
    let mut moved = Vec::new();
    moved.push(*boxed);
    assert_eq!(moved[0].status(), FutureStatus::NotReady);

    run_until_idle(&manager);
    assert_eq!(moved[0].id(), id);
    assert_eq!(moved[0].get(), Some(0x5A));
    assert_eq!(manager.available_futures(), 3);

    moved.clear();
    assert_eq!(manager.available_futures(), 4);
}

#[test]
fn test_backpressure_then_recovery() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x50));
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut futures: Vec<ReadRegisterFuture<'_, u8>> =
        (0..4).map(ReadRegisterFuture::new).collect();
    for future in futures.iter_mut() {
        device.read_register(future).unwrap();
    }
    let mut extra = ReadRegisterFuture::<u8>::new(0x10);
    assert_eq!(device.read_register(&mut extra), Err(I2cError::Again));
    assert!(!extra.is_registered());

    run_until_idle(&manager);
    futures.clear();
    assert_eq!(manager.available_futures(), 4);
    device.read_register(&mut extra).unwrap();
    run_until_idle(&manager);
    assert_eq!(extra.status(), FutureStatus::Ready);
}

#[test]
fn test_sync_mode_register_access() {
    let bus = SimBus::new();
    let slave = RegisterSlave::new(0x68).with_register(0x75, 0x71);
    let registers = slave.registers();
    bus.attach(slave);
    let manager = manager(&bus, ManagerConfig::sync());
    let device = I2cDevice::new(&manager, 0x68).unwrap();

    assert_eq!(device.sync_read_register::<u8>(0x75), Ok(0x71));
    device.sync_write_register(0x6B, 0x80u8).unwrap();
    assert_eq!(registers.get(0x6B), 0x80);
    assert!(manager.is_idle());
    assert_eq!(manager.available_futures(), 4);
}

#[test]
fn test_sync_mode_timeout_then_recovery() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x68).with_register(0x75, 0x71));
    let manager = manager(&bus, ManagerConfig::sync().with_poll_limit(50));
    let device = I2cDevice::new(&manager, 0x68).unwrap();

    bus.set_hung(true);
    assert_eq!(
        device.sync_read_register::<u8>(0x75),
        Err(I2cError::Timeout)
    );
    assert_eq!(manager.phase(), BusPhase::Error);

    bus.set_hung(false);
    assert_eq!(device.sync_read_register::<u8>(0x75), Ok(0x71));
}

#[test]
fn test_interrupt_thread() {
    let bus = SimBus::new();
    let mut slave = RegisterSlave::new(0x77);
    for register in 0..16u8 {
        slave = slave.with_register(register, register ^ 0xA5);
    }
    bus.attach(slave);
    bus.enable_interrupts(true);
    let manager = manager(&bus, ManagerConfig::default());

    let stats = std::thread::scope(|scope| {
        let isr = scope.spawn(|| run_isr(&manager, bus.isr_events()));

        let device = I2cDevice::new(&manager, 0x77).unwrap();
        for batch in 0..4u8 {
            let mut futures: Vec<ReadRegisterFuture<'_, u8>> = (0..4)
                .map(|i| ReadRegisterFuture::new(batch * 4 + i))
                .collect();
            for future in futures.iter_mut() {
                device.read_register(future).unwrap();
            }
            for (i, future) in futures.iter().enumerate() {
                assert_eq!(future.wait(), FutureStatus::Ready);
                let register = batch * 4 + i as u8;
                assert_eq!(future.get(), Some(register ^ 0xA5));
            }
        }

        bus.shutdown_isr();
        isr.join().unwrap()
    });

    assert_eq!(stats.transactions, 16);
    assert_eq!(stats.errors, 0);
    assert!(manager.is_idle());
}

#[test]
fn test_blocking_adapter() {
    let bus = SimBus::new();
    let slave = RegisterSlave::new(0x50)
        .with_register(0x10, 0xAA)
        .with_register(0x11, 0xBB)
        .with_register(0x12, 0xCC)
        .with_register(0x13, 0xDD);
    let registers = slave.registers();
    bus.attach(slave);
    let manager = manager(&bus, ManagerConfig::sync());
    let mut i2c = BlockingI2c::new(&manager);

    let mut buffer = [0u8; 2];
    i2c.write_read(0x50, &[0x10], &mut buffer).unwrap();
    assert_eq!(buffer, [0xAA, 0xBB]);

    i2c.write(0x50, &[0x20, 0x01, 0x02]).unwrap();
    assert_eq!(registers.get(0x20), 0x01);
    assert_eq!(registers.get(0x21), 0x02);

    bus.clear_log();
    let mut head = [0u8; 2];
    let mut tail = [0u8; 2];
    i2c.transaction(
        0x50,
        &mut [
            Operation::Write(&[0x10]),
            Operation::Read(&mut head),
            Operation::Read(&mut tail),
        ],
    )
    .unwrap();
    assert_eq!(head, [0xAA, 0xBB]);
    assert_eq!(tail, [0xCC, 0xDD]);
    // Adjacent reads are merged into one command
    assert_eq!(
        bus.log()
            .iter()
            .filter(|event| **event == BusEvent::RepeatStart)
            .count(),
        1
    );

    let error = i2c.write(0x33, &[0x00]).unwrap_err();
    assert_eq!(
        error.kind(),
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    );
    assert_eq!(manager.available_futures(), 4);
}

#[test]
fn test_debug_recorder_sees_every_step() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x77).with_register(0x35, 0x23));
    let recorder: DebugRecorder<32> = DebugRecorder::new(DebugFilter::STEPS);
    let manager: SimManager<'_, &DebugRecorder<32>> =
        I2cManager::with_observer(bus.twi(), ManagerConfig::default(), &recorder);
    manager.begin();
    let device = I2cDevice::new(&manager, 0x77).unwrap();

    let mut future = ReadRegisterFuture::<u8>::new(0x35);
    device.read_register(&mut future).unwrap();
    run_until_idle(&manager);

    let steps: Vec<DebugEvent> = recorder.events().into_iter().collect();
    assert_eq!(
        steps,
        vec![
            DebugEvent::Step(DebugStatus::Start, 0),
            DebugEvent::Step(DebugStatus::Slaw, 0xEE),
            DebugEvent::Step(DebugStatus::Send, 0x35),
            DebugEvent::Step(DebugStatus::SendOk, 0),
            DebugEvent::Step(DebugStatus::RepeatStart, 0),
            DebugEvent::Step(DebugStatus::Slar, 0xEF),
            DebugEvent::Step(DebugStatus::RecvLast, 0),
            DebugEvent::Step(DebugStatus::RecvOk, 0x23),
            DebugEvent::Step(DebugStatus::Stop, 0),
        ]
    );
}

#[test]
fn test_callbacks_reach_observer() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x77));
    let recorder: DebugRecorder<64> = DebugRecorder::default();
    let manager: SimManager<'_, &DebugRecorder<64>> =
        I2cManager::with_observer(bus.twi(), ManagerConfig::default(), &recorder);
    manager.begin();
    let device = I2cDevice::new(&manager, 0x77).unwrap();

    let mut future = ReadRegisterFuture::<u8>::new(0x00);
    device.read_register(&mut future).unwrap();
    run_until_idle(&manager);

    let callbacks: Vec<I2cCallback> = recorder
        .events()
        .iter()
        .filter_map(|event| match event {
            DebugEvent::Callback(callback, id) => {
                assert_eq!(*id, future.id());
                Some(*callback)
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        callbacks,
        vec![I2cCallback::EndCommand, I2cCallback::EndTransaction]
    );
    assert!(recorder.events().iter().any(|event| matches!(
        event,
        DebugEvent::Status { expected, actual } if expected == actual
    )));
}

#[derive(Default)]
struct ChangeLog(std::cell::RefCell<Vec<(FutureId, FutureStatus)>>);

impl FutureListener for ChangeLog {
    fn on_status_change(&self, id: FutureId, status: FutureStatus) {
        self.0.borrow_mut().push((id, status));
    }
}

#[test]
fn test_listener_told_once_per_future() {
    let bus = SimBus::new();
    bus.attach(RegisterSlave::new(0x51).with_register(0x01, 0x10));
    let manager = manager(&bus, ManagerConfig::default());
    let missing = I2cDevice::new(&manager, 0x50).unwrap();
    let present = I2cDevice::new(&manager, 0x51).unwrap();
    let changes = ChangeLog::default();

    let mut good = ReadRegisterFuture::<u8>::new(0x01);
    present.read_register(&mut good).unwrap();
    run_until_idle_with(&manager, &changes);
    let mut bad = ReadRegisterFuture::<u8>::new(0x01);
    missing.read_register(&mut bad).unwrap();
    run_until_idle_with(&manager, &changes);

    assert_eq!(
        changes.0.borrow().as_slice(),
        &[
            (good.id().unwrap(), FutureStatus::Ready),
            (bad.id().unwrap(), FutureStatus::Error),
        ]
    );
}

#[test]
fn test_futures_group_runs_in_order() {
    let bus = SimBus::new();
    let slave = RegisterSlave::new(0x50).with_register(0x10, 0x42);
    let registers = slave.registers();
    bus.attach(slave);
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut first = ReadRegisterFuture::<u8>::new(0x10);
    let mut second = WriteRegisterFuture::new((0x20u8, 0x99u8));
    let mut third = ReadRegisterFuture::<u8>::new(0x20);
    {
        let members: [&mut dyn GroupMember<'_>; 3] = [&mut first, &mut second, &mut third];
        let group = FuturesGroup::new(device, members);
        group.start().unwrap();
        assert_eq!(group.status(), FutureStatus::NotReady);

        let stats = run_until_idle_with(&manager, &group);
        assert_eq!(stats.transactions, 3);
        assert_eq!(group.wait(), FutureStatus::Ready);
        assert!(group.error().is_none());
    }
    assert_eq!(first.get(), Some(0x42));
    assert_eq!(second.status(), FutureStatus::Ready);
    assert_eq!(third.get(), Some(0x99));
    assert_eq!(registers.get(0x20), 0x99);

    let log = bus.log();
    assert_eq!(log.iter().filter(|event| **event == BusEvent::Start).count(), 3);
    assert_eq!(log.last(), Some(&BusEvent::Stop));
}

#[test]
fn test_futures_group_stops_at_failed_member() {
    let bus = SimBus::new();
    bus.attach(
        RegisterSlave::new(0x50)
            .with_register(0x10, 0x42)
            .nack_data_after(3),
    );
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut first = ReadRegisterFuture::<u8>::new(0x10);
    let mut second = WriteRegisterFuture::new((0x20u8, [1u8, 2, 3]));
    let mut third = ReadRegisterFuture::<u8>::new(0x20);
    {
        let members: [&mut dyn GroupMember<'_>; 3] = [&mut first, &mut second, &mut third];
        let group = FuturesGroup::new(device, members);
        group.start().unwrap();
        run_until_idle_with(&manager, &group);
        assert_eq!(group.status(), FutureStatus::Error);
        assert_eq!(group.error(), Some(I2cError::DataNack));

        // Finished groups can be started again; the failed member is not
        // re-armed, so the group fails at once
        group.start().unwrap();
        assert_eq!(group.status(), FutureStatus::Error);
    }
    assert_eq!(first.get(), Some(0x42));
    assert_eq!(second.error(), Some(I2cError::DataNack));
    assert!(!third.is_registered());
    assert!(manager.is_idle());
}

#[test]
fn test_register_writes_group() {
    let bus = SimBus::new();
    let slave = RegisterSlave::new(0x68);
    let registers = slave.registers();
    bus.attach(slave);
    let manager = manager(&bus, ManagerConfig::default());
    let device = I2cDevice::new(&manager, 0x68).unwrap();

    let group = FuturesGroup::new(
        device,
        RegisterWrites::new(&[(0x6B, 0x80), (0x19, 0x07), (0x1A, 0x03)]),
    );
    group.start().unwrap();
    assert_eq!(manager.available_futures(), 3);
    run_until_idle_with(&manager, &group);
    assert_eq!(group.status(), FutureStatus::Ready);
    assert_eq!(registers.get(0x6B), 0x80);
    assert_eq!(registers.get(0x19), 0x07);
    assert_eq!(registers.get(0x1A), 0x03);

    drop(group);
    assert_eq!(manager.available_futures(), 4);
}

#[test]
fn test_sync_mode_group() {
    let bus = SimBus::new();
    let slave = RegisterSlave::new(0x68).with_register(0x75, 0x71);
    let registers = slave.registers();
    bus.attach(slave);
    let manager = manager(&bus, ManagerConfig::sync());
    let device = I2cDevice::new(&manager, 0x68).unwrap();

    let mut whoami = ReadRegisterFuture::<u8>::new(0x75);
    let mut reset = WriteRegisterFuture::new((0x6Bu8, 0x80u8));
    {
        let members: [&mut dyn GroupMember<'_>; 2] = [&mut whoami, &mut reset];
        let group = FuturesGroup::new(device, members);
        group.start().unwrap();
        assert_eq!(group.status(), FutureStatus::Ready);
    }
    assert_eq!(whoami.get(), Some(0x71));
    assert_eq!(registers.get(0x6B), 0x80);
    assert!(manager.is_idle());
}

#[test]
fn test_latest_status_after_address_nack() {
    let bus = SimBus::new();
    let latest = LatestStatus::new();
    let manager: SimManager<'_, &LatestStatus> =
        I2cManager::with_observer(bus.twi(), ManagerConfig::default(), &latest);
    manager.begin();
    let device = I2cDevice::new(&manager, 0x50).unwrap();

    let mut future = ReadRegisterFuture::<u8>::new(0x00);
    device.read_register(&mut future).unwrap();
    run_until_idle(&manager);

    assert_eq!(future.error(), Some(I2cError::AddressNack));
    assert_eq!(latest.latest_status(), TwiStatus::SLA_W_TRANSMITTED_NACK);
    assert_eq!(
        latest.latest_expected_status(),
        TwiStatus::SLA_W_TRANSMITTED_ACK
    );
}
