// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Transfer state machine tests

use super::*;
use proptest::prelude::*;

const GP0: u32 = 0x1F80_1810;

const BURST_TO_RAM: u32 = 0x0100_0000;
const BURST_FROM_RAM: u32 = 0x0100_0001;
const BURST_FROM_RAM_DECREMENT: u32 = 0x0100_0003;
const SLICE_FROM_RAM: u32 = 0x0100_0201;
const LINKED_LIST: u32 = 0x0100_0401;

fn gpu_setup() -> (Bus, Dma, SharedPort) {
    let mut bus = Bus::new();
    let gp0 = FifoPort::attach(&mut bus, GP0);
    (bus, enabled_dma(), gp0)
}

#[test]
fn test_burst_moves_every_word() {
    let (mut bus, mut dma, gp0) = gpu_setup();
    let words = [0x1111_1111, 0x2222_2222, 0x3333_3333, 0x4444_4444, 0x5555_5555];
    fill_ram(&mut bus, 0x1000, &words);

    assert!(program(&mut dma, ChannelKind::Gpu, 0x1000, 5, BURST_FROM_RAM).unwrap());
    assert!(dma.channel(ChannelKind::Gpu).is_transfer_active());
    assert_eq!(dma.channel(ChannelKind::Gpu).words_remaining(), 5);

    let outcomes = dma.service(&mut bus).unwrap();

    assert_eq!(outcomes, vec![(ChannelKind::Gpu, TransferStatus::Completed)]);
    assert_eq!(gp0.borrow().words_written(), words);
    assert_eq!(bus.take_pending_cycles(), 5);

    let channel = dma.channel(ChannelKind::Gpu);
    assert_eq!(channel.words_remaining(), 0);
    assert_eq!(channel.current_address(), 0x1014);
    assert!(!channel.is_running());
    assert!(!channel.control().start_busy());

    // Programmed registers survive completion
    assert_eq!(channel.base_address(), 0x1000);
    assert_eq!(channel.block_control().0, 5);
    assert_eq!(channel.shadow_base_address(), 0x1000);
}

#[test]
fn test_burst_decrement() {
    let (mut bus, mut dma, gp0) = gpu_setup();
    fill_ram(&mut bus, 0x2000, &[0xA, 0xB, 0xC]);

    program(&mut dma, ChannelKind::Gpu, 0x2008, 3, BURST_FROM_RAM_DECREMENT).unwrap();
    dma.service(&mut bus).unwrap();

    assert_eq!(gp0.borrow().words_written(), vec![0xC, 0xB, 0xA]);
    assert_eq!(dma.channel(ChannelKind::Gpu).current_address(), 0x1FFC);
}

#[test]
fn test_start_address_is_word_aligned() {
    let (mut bus, mut dma, gp0) = gpu_setup();
    fill_ram(&mut bus, 0x3000, &[0xDEAD_BEEF]);

    program(&mut dma, ChannelKind::Gpu, 0x3003, 1, BURST_FROM_RAM).unwrap();
    dma.service(&mut bus).unwrap();

    assert_eq!(gp0.borrow().words_written(), vec![0xDEAD_BEEF]);
    assert_eq!(dma.channel(ChannelKind::Gpu).base_address(), 0x3003);
}

#[test]
fn test_address_wraps_in_24_bits_and_faults() {
    let (mut bus, mut dma, gp0) = gpu_setup();
    fill_ram(&mut bus, 0x0, &[0x1234, 0x5678]);

    program(&mut dma, ChannelKind::Gpu, 0x4, 3, BURST_FROM_RAM_DECREMENT).unwrap();
    let outcomes = dma.service(&mut bus).unwrap();

    assert_eq!(outcomes, vec![(ChannelKind::Gpu, TransferStatus::Faulted)]);
    assert_eq!(gp0.borrow().words_written(), vec![0x5678, 0x1234]);
    assert_eq!(bus.last_fault_address(), Some(0x00FF_FFFC));

    let channel = dma.channel(ChannelKind::Gpu);
    assert_eq!(channel.current_address(), 0x00FF_FFFC);
    assert_eq!(channel.words_remaining(), 1);
}

#[test]
fn test_fault_mid_burst_stops_transfer() {
    let (mut bus, mut dma, gp0) = gpu_setup();
    dma.write(0x74, 0x0080_0000, FULL).unwrap();
    fill_ram(&mut bus, 0x7F_FFF8, &[0xAAAA_AAAA, 0xBBBB_BBBB]);

    // The third word lies just past the end of RAM mirrors
    program(&mut dma, ChannelKind::Gpu, 0x7F_FFF8, 4, BURST_FROM_RAM).unwrap();
    let outcomes = dma.service(&mut bus).unwrap();

    assert_eq!(outcomes, vec![(ChannelKind::Gpu, TransferStatus::Faulted)]);
    // The faulting read never reaches the port
    assert_eq!(
        gp0.borrow().log,
        vec![Access::Write32(0xAAAA_AAAA), Access::Write32(0xBBBB_BBBB)]
    );
    assert_eq!(bus.take_pending_cycles(), 3);
    assert!(!bus.exception_pending());

    let channel = dma.channel(ChannelKind::Gpu);
    assert_eq!(channel.words_remaining(), 2);
    assert_eq!(channel.current_address(), 0x80_0000);
    assert!(channel.is_running());
    assert!(!channel.is_transfer_active());

    // Bus error reported through DICR
    assert_ne!(dma.read(0x74).unwrap() & (1 << 15), 0);
    assert!(dma.interrupt_line());

    // Nothing further happens until software intervenes
    assert!(dma.service(&mut bus).unwrap().is_empty());
    assert_eq!(gp0.borrow().log.len(), 2);
}

#[test]
fn test_faulted_transfer_retries_on_force_start() {
    let (mut bus, mut dma, gp0) = gpu_setup();
    fill_ram(&mut bus, 0x7F_FFF8, &[0xAAAA_AAAA, 0xBBBB_BBBB]);
    program(&mut dma, ChannelKind::Gpu, 0x7F_FFF8, 4, BURST_FROM_RAM).unwrap();
    dma.service(&mut bus).unwrap();

    assert!(dma.write(0x28, BURST_FROM_RAM | 0x1000_0000, FULL).unwrap());
    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::Faulted)]
    );
    assert_eq!(dma.channel(ChannelKind::Gpu).words_remaining(), 2);
    assert!(!dma.channel(ChannelKind::Gpu).control().force_start());

    // Retrying the same unit pushes nothing new to GP0
    assert_eq!(gp0.borrow().words_written(), vec![0xAAAA_AAAA, 0xBBBB_BBBB]);
    assert!(!gp0.borrow().words_written().contains(&0xFFFF_FFFF));
}

#[test]
fn test_fault_towards_ram_keeps_fetched_word() {
    let (mut bus, mut dma, gp0) = gpu_setup();
    gp0.borrow_mut().fifo.extend([0xA, 0xB, 0xC, 0xD]);

    // First write lands in the last RAM mirror word, the second faults
    program(&mut dma, ChannelKind::Gpu, 0x7F_FFFC, 3, BURST_TO_RAM).unwrap();
    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::Faulted)]
    );

    assert_eq!(bus.read32(0x7F_FFFC).unwrap(), 0xA);
    assert_eq!(gp0.borrow().log, vec![Access::Read32, Access::Read32]);
    assert_eq!(dma.channel(ChannelKind::Gpu).words_remaining(), 2);

    // The retry writes the word it already holds instead of popping again
    assert!(dma.write(0x28, BURST_TO_RAM | 0x1000_0000, FULL).unwrap());
    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::Faulted)]
    );

    let port = gp0.borrow();
    assert_eq!(port.log.len(), 2);
    assert_eq!(port.fifo, [0xC, 0xD]);
    assert_eq!(dma.channel(ChannelKind::Gpu).words_remaining(), 2);
}

#[test]
fn test_abort_drops_held_word() {
    let (mut bus, mut dma, gp0) = gpu_setup();
    gp0.borrow_mut().fifo.extend([0xA, 0xB, 0xC]);

    program(&mut dma, ChannelKind::Gpu, 0x7F_FFFC, 3, BURST_TO_RAM).unwrap();
    dma.service(&mut bus).unwrap();
    dma.write(0x28, 0x0000_0000, FULL).unwrap();

    // A fresh transfer starts from the port again
    program(&mut dma, ChannelKind::Gpu, 0x1000, 1, BURST_TO_RAM).unwrap();
    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::Completed)]
    );
    assert_eq!(bus.read32(0x1000).unwrap(), 0xC);
    assert_eq!(gp0.borrow().log.len(), 3);
}

#[test]
fn test_clearing_start_aborts_transfer() {
    let (mut bus, mut dma, _gp0) = gpu_setup();
    program(&mut dma, ChannelKind::Gpu, 0x7F_FFF8, 4, BURST_FROM_RAM).unwrap();
    dma.service(&mut bus).unwrap();

    assert!(!dma.write(0x28, 0x0000_0001, FULL).unwrap());

    let channel = dma.channel(ChannelKind::Gpu);
    assert!(!channel.is_running());
    assert!(!channel.is_transfer_active());
    assert!(!dma.dreq_rising_edge(ChannelKind::Gpu).unwrap());
}

#[test]
fn test_unsupported_direction_touches_nothing() {
    let mut bus = Bus::new();
    let cd = FifoPort::attach(&mut bus, 0x1F80_1802);
    let mut dma = enabled_dma();
    fill_ram(&mut bus, 0x1000, &[0xCAFE_BABE; 4]);

    let result = program(&mut dma, ChannelKind::CdRom, 0x1000, 4, BURST_FROM_RAM);

    assert!(matches!(
        result,
        Err(EmulatorError::Dma(DmaError::UnsupportedDirection { channel: 3, .. }))
    ));
    assert!(cd.borrow().log.is_empty());
    assert_eq!(bus.pending_cycles(), 0);
    assert_eq!(bus.read32(0x1000).unwrap(), 0xCAFE_BABE);
    assert!(!dma.channel(ChannelKind::CdRom).is_running());
    assert!(dma.service(&mut bus).unwrap().is_empty());
}

#[test]
fn test_mdec_directions_are_locked() {
    let mut dma = enabled_dma();

    assert!(program(&mut dma, ChannelKind::MdecIn, 0x1000, 1, 0x0100_0000).is_err());
    assert!(program(&mut dma, ChannelKind::MdecOut, 0x1000, 1, BURST_FROM_RAM).is_err());
}

#[test]
fn test_linked_list_walk() {
    let (mut bus, mut dma, gp0) = gpu_setup();

    // 0x1000: two words -> 0x2000: empty -> 0x3000: one word, end
    fill_ram(&mut bus, 0x1000, &[0x0200_2000, 0xE100_0000, 0xE200_0000]);
    fill_ram(&mut bus, 0x2000, &[0x0000_3000]);
    fill_ram(&mut bus, 0x3000, &[0x01FF_FFFF, 0x2800_0000]);

    program(&mut dma, ChannelKind::Gpu, 0x1000, 0, LINKED_LIST).unwrap();
    let outcomes = dma.service(&mut bus).unwrap();

    assert_eq!(outcomes, vec![(ChannelKind::Gpu, TransferStatus::Completed)]);
    assert_eq!(
        gp0.borrow().words_written(),
        vec![0xE100_0000, 0xE200_0000, 0x2800_0000]
    );

    let channel = dma.channel(ChannelKind::Gpu);
    assert_eq!(channel.linked_list_node_count(), 3);
    assert_eq!(channel.base_address(), 0x00FF_FFFF);
    // Three headers plus three words
    assert_eq!(bus.take_pending_cycles(), 6);
}

#[test]
fn test_cyclic_linked_list_is_fatal() {
    let (mut bus, mut dma, _gp0) = gpu_setup();
    fill_ram(&mut bus, 0x1000, &[0x0000_1000]);

    program(&mut dma, ChannelKind::Gpu, 0x1000, 0, LINKED_LIST).unwrap();
    let result = dma.service(&mut bus);

    assert!(matches!(
        result,
        Err(EmulatorError::Dma(DmaError::LinkedListOverflow {
            channel: 2,
            limit: LINKED_MAX_NODE_COUNT,
            address: 0x1000,
        }))
    ));
    assert_eq!(
        dma.channel(ChannelKind::Gpu).linked_list_node_count(),
        LINKED_MAX_NODE_COUNT
    );
}

#[test]
fn test_linked_list_at_node_limit_completes() {
    let (mut bus, mut dma, _gp0) = gpu_setup();

    // 4096 empty nodes, the last one terminating the list
    let base = 0x1_0000;
    for i in 0..LINKED_MAX_NODE_COUNT {
        let address = base + 4 * i;
        let header = if i == LINKED_MAX_NODE_COUNT - 1 {
            0x00FF_FFFF
        } else {
            address + 4
        };
        bus.write32(address, header).unwrap();
    }

    program(&mut dma, ChannelKind::Gpu, base, 0, LINKED_LIST).unwrap();

    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::Completed)]
    );
}

#[test]
fn test_linked_list_protocol_errors() {
    let mut dma = enabled_dma();

    // Linked list towards RAM
    assert!(matches!(
        program(&mut dma, ChannelKind::Gpu, 0x1000, 0, 0x0100_0400),
        Err(EmulatorError::Dma(DmaError::UnsupportedDirection { .. }))
    ));

    // Linked list on a channel other than GPU
    assert!(matches!(
        program(&mut dma, ChannelKind::Spu, 0x1000, 0, LINKED_LIST),
        Err(EmulatorError::Dma(DmaError::UnsupportedSyncMode { channel: 4, mode: 2, .. }))
    ));

    // Reserved sync mode
    assert!(matches!(
        program(&mut dma, ChannelKind::Pio, 0x1000, 1, 0x0100_0601),
        Err(EmulatorError::Dma(DmaError::UnsupportedSyncMode { mode: 3, .. }))
    ));
}

#[test]
fn test_slice_runs_one_block_per_request() {
    let (mut bus, mut dma, gp0) = gpu_setup();
    fill_ram(&mut bus, 0x1000, &[1, 2, 3, 4, 5, 6]);

    // Three blocks of two words
    program(&mut dma, ChannelKind::Gpu, 0x1000, 0x0003_0002, SLICE_FROM_RAM).unwrap();
    assert_eq!(dma.channel(ChannelKind::Gpu).words_remaining(), 6);
    assert_eq!(dma.channel(ChannelKind::Gpu).blocks_remaining(), 3);

    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::BlockDone)]
    );
    {
        let channel = dma.channel(ChannelKind::Gpu);
        assert_eq!(channel.blocks_remaining(), 2);
        assert_eq!(channel.words_remaining(), 4);
        assert_eq!(channel.base_address(), 0x1008);
        assert_eq!(channel.block_control().0, 0x0002_0002);
        assert!(channel.is_running());
        assert!(!channel.is_transfer_active());
    }
    assert_eq!(gp0.borrow().words_written(), vec![1, 2]);

    // Nothing moves without a request
    assert!(dma.service(&mut bus).unwrap().is_empty());

    assert!(dma.dreq_rising_edge(ChannelKind::Gpu).unwrap());
    assert!(!dma.dreq_rising_edge(ChannelKind::Gpu).unwrap());
    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::BlockDone)]
    );

    assert!(dma.dreq_rising_edge(ChannelKind::Gpu).unwrap());
    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::Completed)]
    );

    let channel = dma.channel(ChannelKind::Gpu);
    assert_eq!(gp0.borrow().words_written(), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(channel.base_address(), 0x1018);
    assert!(!channel.is_running());
    assert!(!dma.dreq_rising_edge(ChannelKind::Gpu).unwrap());
}

#[test]
fn test_slice_block_interrupts() {
    let (mut bus, mut dma, _gp0) = gpu_setup();
    // Master, GPU IRQ enable, GPU per-block IRQ
    let dicr = 0x0080_0000 | (1 << 18) | (1 << 2);
    dma.write(0x74, dicr, FULL).unwrap();

    program(&mut dma, ChannelKind::Gpu, 0x1000, 0x0002_0001, SLICE_FROM_RAM).unwrap();
    dma.service(&mut bus).unwrap();

    assert!(dma.interrupt_line());
    assert!(dma.take_irq_edge());

    dma.write(0x74, dicr | (1 << 26), FULL).unwrap();
    assert!(!dma.interrupt_line());

    dma.dreq_rising_edge(ChannelKind::Gpu).unwrap();
    dma.service(&mut bus).unwrap();
    assert!(dma.interrupt_line());
    assert!(dma.take_irq_edge());
}

#[test]
fn test_slice_without_block_irq_only_flags_completion() {
    let (mut bus, mut dma, _gp0) = gpu_setup();
    dma.write(0x74, 0x0080_0000 | (1 << 18), FULL).unwrap();

    program(&mut dma, ChannelKind::Gpu, 0x1000, 0x0002_0001, SLICE_FROM_RAM).unwrap();
    dma.service(&mut bus).unwrap();
    assert!(!dma.interrupt_line());

    dma.dreq_rising_edge(ChannelKind::Gpu).unwrap();
    dma.service(&mut bus).unwrap();
    assert!(dma.interrupt_line());
}

#[test]
fn test_chopping_windows() {
    let (mut bus, mut dma, gp0) = gpu_setup();
    fill_ram(&mut bus, 0x1000, &(0..10).collect::<Vec<u32>>());

    // Four-word DMA window, eight-cycle CPU window
    program(&mut dma, ChannelKind::Gpu, 0x1000, 10, 0x0132_0101).unwrap();

    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::Chopped { resume_in: 8 })]
    );
    assert_eq!(dma.channel(ChannelKind::Gpu).words_remaining(), 6);
    assert_eq!(bus.take_pending_cycles(), 4);
    assert!(dma.service(&mut bus).unwrap().is_empty());

    let generation = dma.channel(ChannelKind::Gpu).transfer_generation();
    assert!(dma.resume(ChannelKind::Gpu, generation).unwrap());
    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::Chopped { resume_in: 8 })]
    );

    let generation = dma.channel(ChannelKind::Gpu).transfer_generation();
    assert!(dma.resume(ChannelKind::Gpu, generation).unwrap());
    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::Completed)]
    );
    assert_eq!(gp0.borrow().words_written(), (0..10).collect::<Vec<u32>>());

    let generation = dma.channel(ChannelKind::Gpu).transfer_generation();
    assert!(!dma.resume(ChannelKind::Gpu, generation).unwrap());
}

#[test]
fn test_resume_for_replaced_transfer_is_ignored() {
    let (mut bus, mut dma, gp0) = gpu_setup();

    program(&mut dma, ChannelKind::Gpu, 0x1000, 10, 0x0132_0101).unwrap();
    dma.service(&mut bus).unwrap();
    let stale = dma.channel(ChannelKind::Gpu).transfer_generation();

    // Abort, then start over while the first window's resume is still owed
    dma.write(0x28, 0x0032_0101, FULL).unwrap();
    assert!(!dma.resume(ChannelKind::Gpu, stale).unwrap());
    assert!(program(&mut dma, ChannelKind::Gpu, 0x1000, 10, 0x0132_0101).unwrap());
    dma.service(&mut bus).unwrap();

    assert!(!dma.resume(ChannelKind::Gpu, stale).unwrap());
    assert!(!dma.channel(ChannelKind::Gpu).is_transfer_active());
    assert_eq!(gp0.borrow().words_written().len(), 8);

    let current = dma.channel(ChannelKind::Gpu).transfer_generation();
    assert!(dma.resume(ChannelKind::Gpu, current).unwrap());
}

#[test]
fn test_ordering_table_clear() {
    let mut bus = Bus::new();
    let mut dma = enabled_dma();

    assert!(program(&mut dma, ChannelKind::Otc, 0x1010, 5, 0x1100_0000).unwrap());
    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Otc, TransferStatus::Completed)]
    );

    assert_eq!(bus.read32(0x1010).unwrap(), 0x100C);
    assert_eq!(bus.read32(0x100C).unwrap(), 0x1008);
    assert_eq!(bus.read32(0x1008).unwrap(), 0x1004);
    assert_eq!(bus.read32(0x1004).unwrap(), 0x1000);
    assert_eq!(bus.read32(0x1000).unwrap(), 0x00FF_FFFF);
    assert_eq!(bus.read32(0x0FFC).unwrap(), 0);
    assert_eq!(bus.take_pending_cycles(), 5);

    // Busy and force start both drop once the table is built
    assert_eq!(dma.read(0x68).unwrap(), 0x0000_0002);
}

#[test]
fn test_ordering_table_single_entry() {
    let mut bus = Bus::new();
    let mut dma = enabled_dma();

    program(&mut dma, ChannelKind::Otc, 0x2000, 1, 0x1100_0000).unwrap();
    dma.service(&mut bus).unwrap();

    assert_eq!(bus.read32(0x2000).unwrap(), 0x00FF_FFFF);
    assert_eq!(bus.read32(0x1FFC).unwrap(), 0);
}

#[test]
fn test_disabled_channel_waits_for_dpcr() {
    let mut bus = Bus::new();
    let gp0 = FifoPort::attach(&mut bus, GP0);
    let mut dma = Dma::new();

    assert!(!program(&mut dma, ChannelKind::Gpu, 0x1000, 2, BURST_FROM_RAM).unwrap());
    assert!(dma.channel(ChannelKind::Gpu).is_transfer_active());
    assert!(dma.service(&mut bus).unwrap().is_empty());

    assert!(dma.write(0x70, DmaController::DPCR_RESET | 0x800, FULL).unwrap());
    assert_eq!(
        dma.service(&mut bus).unwrap(),
        vec![(ChannelKind::Gpu, TransferStatus::Completed)]
    );
    assert_eq!(gp0.borrow().words_written().len(), 2);
}

#[test]
fn test_service_follows_priority() {
    let mut bus = Bus::new();
    let _gp0 = FifoPort::attach(&mut bus, GP0);
    let mut dma = Dma::new();
    // OTC priority 0, GPU priority 5
    dma.write(0x70, 0x0800_0D00, FULL).unwrap();

    program(&mut dma, ChannelKind::Gpu, 0x1000, 1, BURST_FROM_RAM).unwrap();
    program(&mut dma, ChannelKind::Otc, 0x2000, 1, 0x1100_0000).unwrap();

    let order: Vec<ChannelKind> = dma
        .service(&mut bus)
        .unwrap()
        .into_iter()
        .map(|(kind, _)| kind)
        .collect();
    assert_eq!(order, vec![ChannelKind::Otc, ChannelKind::Gpu]);
}

#[test]
fn test_completion_interrupt() {
    let mut bus = Bus::new();
    let mut dma = enabled_dma();
    dma.write(0x74, 0x0080_0000 | (1 << 22), FULL).unwrap();

    program(&mut dma, ChannelKind::Otc, 0x100, 2, 0x1100_0000).unwrap();
    assert!(!dma.interrupt_line());
    dma.service(&mut bus).unwrap();

    assert!(dma.interrupt_line());
    assert_ne!(dma.read(0x74).unwrap() & (1 << 30), 0);
}

proptest! {
    #[test]
    fn prop_burst_retires_each_word_once(count in 1u32..64, start in 0u32..0x1000) {
        let mut bus = Bus::new();
        let gp0 = FifoPort::attach(&mut bus, GP0);
        let mut dma = enabled_dma();
        let start = start * 4;

        program(&mut dma, ChannelKind::Gpu, start, count, BURST_FROM_RAM).unwrap();
        let outcomes = dma.service(&mut bus).unwrap();

        prop_assert_eq!(outcomes, vec![(ChannelKind::Gpu, TransferStatus::Completed)]);
        prop_assert_eq!(gp0.borrow().words_written().len() as u32, count);
        prop_assert_eq!(bus.take_pending_cycles(), count as u64);
        prop_assert_eq!(
            dma.channel(ChannelKind::Gpu).current_address(),
            (start + 4 * count) & ADDRESS_MASK
        );
    }
}
