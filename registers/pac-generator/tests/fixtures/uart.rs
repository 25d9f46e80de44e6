// Licensed under the Apache-2.0 license

// Generated by litex-pac-generator. Do not edit.

pub const UART_ADDR: usize = 0x8200_0000;
pub const UART_IRQ: u32 = 2;

pub mod bits {
    //! Types that represent individual registers (bitfields).
    use tock_registers::register_bitfields;
    register_bitfields! {
        u8,
        pub Status [
            Ready OFFSET(0) NUMBITS(1) [],
            Level OFFSET(2) NUMBITS(3) [],
        ],
    }
    register_bitfields! {
        u32,
        pub Control [
            Start OFFSET(0) NUMBITS(1) [],
            Length OFFSET(8) NUMBITS(8) [],
        ],
    }
}

pub mod regs {
    //! Types that represent registers.
    use tock_registers::register_structs;
    register_structs! {
        pub Uart {
            (0x0 => pub rxtx: tock_registers::registers::ReadWrite<u8>),
            (0x1 => _reserved0),
            (0x4 => pub status: tock_registers::registers::ReadOnly<u8, super::bits::Status::Register>),
            (0x5 => _reserved1),
            (0x8 => pub control: tock_registers::registers::ReadWrite<u32, super::bits::Control::Register>),
            (0xc => @END),
        }
    }
}

/// Returns the register block at [`UART_ADDR`].
///
/// # Safety
///
/// The caller must not create aliasing accesses that break the peripheral's protocol.
pub unsafe fn registers() -> &'static regs::Uart {
    unsafe { &*(UART_ADDR as *const regs::Uart) }
}
