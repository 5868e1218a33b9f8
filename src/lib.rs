//! Driver for the Timer_B7 peripheral of MSP430F5xx/6xx microcontrollers, with [`embedded_hal`]
//! trait implementations.
//! Here is the [`User's guide`] for reference (chapter "Timer_B").
//!
//! [`embedded_hal`]: https://github.com/rust-embedded/embedded-hal
//! [`User's guide`]: https://www.ti.com/lit/ug/slau208q/slau208q.pdf
//!
//! # Usage
//!
//! Obtain the register block with [`timer::TimerB7::tb0`] and hand it to one of
//! [`timer::TimerParts`], [`capture::CaptureParts7`] or [`pwm::PwmParts7`], which configure the
//! peripheral and split it into per-register objects.
//!
//! The live counter is read through [`counter::Counter`], which samples TBxR until two
//! consecutive reads agree, since the counter is clocked asynchronously to the CPU.
//!
//! Register read-modify-write sequences run inside a [`critical_section`], so the final binary
//! must provide an implementation, for example through the `critical-section-single-core`
//! feature of the `msp430` crate.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod capture;
pub mod counter;
pub mod pwm;
pub mod timer;

mod hw_traits;
