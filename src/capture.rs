//! Capture ports
//!
//! Configures a Timer_B7 peripheral into capture pins. Each capture pin has a 16-bit capture
//! register where its timer value is written whenever its capture event is triggered.
//!
//! Due to hardware constraints, the configurations for all capture pins derived from a timer must
//! be decided before any of them can be used. This differs from `Pwm`, where each pin's output
//! mode can be changed on its own.

use crate::counter::Counter;
use crate::hw_traits::timerb::{CCRn, Ccis, Cm, TimerB};
use crate::timer::{read_tbxiv, TimerVector};
use core::marker::PhantomData;

pub use crate::timer::{
    TimerB7, TimerConfig, TimerDiv, TimerExDiv, CCR0, CCR1, CCR2, CCR3, CCR4, CCR5, CCR6,
};

/// Capture edge trigger
#[derive(Clone, Copy)]
pub enum CapTrigger {
    /// Capture on rising edge
    RisingEdge,
    /// Capture on falling edge
    FallingEdge,
    /// Capture on both edges
    BothEdges,
}

impl From<CapTrigger> for Cm {
    #[inline]
    fn from(val: CapTrigger) -> Self {
        match val {
            CapTrigger::RisingEdge => Cm::RisingEdge,
            CapTrigger::FallingEdge => Cm::FallingEdge,
            CapTrigger::BothEdges => Cm::BothEdges,
        }
    }
}

struct PinConfig {
    select: Ccis,
    trigger: CapTrigger,
    sync: bool,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            select: Ccis::Gnd,
            trigger: CapTrigger::RisingEdge,
            sync: true,
        }
    }
}

macro_rules! config_fn {
    (
        $config_sel_a:ident,
        $config_sel_b:ident,
        $config_sel_vcc:ident,
        $config_trigger:ident,
        $config_async:ident,
        $pin:ident
    ) => {
        #[allow(non_snake_case)]
        #[inline(always)]
        /// Configure the capture input select of the capture pin as capture input A
        pub fn $config_sel_a(mut self) -> Self {
            self.$pin.select = Ccis::InputA;
            self
        }

        #[allow(non_snake_case)]
        #[inline(always)]
        /// Configure the capture input select of the capture pin as capture input B
        pub fn $config_sel_b(mut self) -> Self {
            self.$pin.select = Ccis::InputB;
            self
        }

        #[inline(always)]
        /// Configure the capture input select of the capture pin as VCC. Toggling between GND and
        /// VCC through `set_software_input` triggers a capture from software.
        pub fn $config_sel_vcc(mut self) -> Self {
            self.$pin.select = Ccis::Vcc;
            self
        }

        #[inline(always)]
        /// Configure the capture trigger event of the capture pin
        pub fn $config_trigger(mut self, trigger: CapTrigger) -> Self {
            self.$pin.trigger = trigger;
            self
        }

        #[inline(always)]
        /// Capture immediately on the input edge instead of on the next timer clock. Asynchronous
        /// captures can race the counter increment.
        pub fn $config_async(mut self) -> Self {
            self.$pin.sync = false;
            self
        }
    };
}

/// Builder object for configuring capture ports derived from a Timer_B7 peripheral
///
/// Each pin has a input source, which determines the signal that controls the capture, and a
/// capture trigger event, which determines the input transitions that actually trigger the
/// capture. By default, all pins use GND as their input source, trigger a capture on a rising
/// edge, and synchronize the capture to the timer clock.
pub struct CaptureConfig7 {
    timer: TimerB7,
    config: TimerConfig,
    cap0: PinConfig,
    cap1: PinConfig,
    cap2: PinConfig,
    cap3: PinConfig,
    cap4: PinConfig,
    cap5: PinConfig,
    cap6: PinConfig,
}

impl CaptureParts7 {
    /// Create capture configuration
    pub fn config(timer: TimerB7, config: TimerConfig) -> CaptureConfig7 {
        CaptureConfig7 {
            timer,
            config,
            cap0: PinConfig::default(),
            cap1: PinConfig::default(),
            cap2: PinConfig::default(),
            cap3: PinConfig::default(),
            cap4: PinConfig::default(),
            cap5: PinConfig::default(),
            cap6: PinConfig::default(),
        }
    }
}

impl CaptureConfig7 {
    config_fn!(
        config_cap0_input_A,
        config_cap0_input_B,
        config_cap0_input_vcc,
        config_cap0_trigger,
        config_cap0_async,
        cap0
    );
    config_fn!(
        config_cap1_input_A,
        config_cap1_input_B,
        config_cap1_input_vcc,
        config_cap1_trigger,
        config_cap1_async,
        cap1
    );
    config_fn!(
        config_cap2_input_A,
        config_cap2_input_B,
        config_cap2_input_vcc,
        config_cap2_trigger,
        config_cap2_async,
        cap2
    );
    config_fn!(
        config_cap3_input_A,
        config_cap3_input_B,
        config_cap3_input_vcc,
        config_cap3_trigger,
        config_cap3_async,
        cap3
    );
    config_fn!(
        config_cap4_input_A,
        config_cap4_input_B,
        config_cap4_input_vcc,
        config_cap4_trigger,
        config_cap4_async,
        cap4
    );
    config_fn!(
        config_cap5_input_A,
        config_cap5_input_B,
        config_cap5_input_vcc,
        config_cap5_trigger,
        config_cap5_async,
        cap5
    );
    config_fn!(
        config_cap6_input_A,
        config_cap6_input_B,
        config_cap6_input_vcc,
        config_cap6_trigger,
        config_cap6_async,
        cap6
    );

    /// Writes all previously configured timer and capture settings into peripheral registers
    pub fn commit(self) -> CaptureParts7 {
        let timer = self.timer;
        self.config.write_regs(&timer);
        commit_pin::<CCR0>(&timer, self.cap0);
        commit_pin::<CCR1>(&timer, self.cap1);
        commit_pin::<CCR2>(&timer, self.cap2);
        commit_pin::<CCR3>(&timer, self.cap3);
        commit_pin::<CCR4>(&timer, self.cap4);
        commit_pin::<CCR5>(&timer, self.cap5);
        commit_pin::<CCR6>(&timer, self.cap6);
        timer.continuous();

        unsafe {
            CaptureParts7 {
                cap0: Capture::new(timer.alias()),
                cap1: Capture::new(timer.alias()),
                cap2: Capture::new(timer.alias()),
                cap3: Capture::new(timer.alias()),
                cap4: Capture::new(timer.alias()),
                cap5: Capture::new(timer.alias()),
                cap6: Capture::new(timer.alias()),
                counter: Counter::new(timer.alias()),
                tbxiv: TBxIV(timer),
            }
        }
    }
}

#[inline(always)]
fn commit_pin<C>(timer: &TimerB7, pin: PinConfig)
where
    TimerB7: CCRn<C>,
{
    CCRn::<C>::config_cap_mode(timer, pin.trigger.into(), pin.select, pin.sync);
}

/// Collection of capture pins derived from a Timer_B7 peripheral
pub struct CaptureParts7 {
    /// Capture pin 0 (derived from capture-compare register 0)
    pub cap0: Capture<CCR0>,
    /// Capture pin 1 (derived from capture-compare register 1)
    pub cap1: Capture<CCR1>,
    /// Capture pin 2 (derived from capture-compare register 2)
    pub cap2: Capture<CCR2>,
    /// Capture pin 3 (derived from capture-compare register 3)
    pub cap3: Capture<CCR3>,
    /// Capture pin 4 (derived from capture-compare register 4)
    pub cap4: Capture<CCR4>,
    /// Capture pin 5 (derived from capture-compare register 5)
    pub cap5: Capture<CCR5>,
    /// Capture pin 6 (derived from capture-compare register 6)
    pub cap6: Capture<CCR6>,
    /// Live counter of the free-running capture timer
    pub counter: Counter,
    /// Interrupt vector register
    pub tbxiv: TBxIV,
}

/// Single capture pin with its own capture register
pub struct Capture<C> {
    timer: TimerB7,
    _ccr: PhantomData<C>,
}

impl<C> Capture<C> {
    fn new(timer: TimerB7) -> Self {
        Capture {
            timer,
            _ccr: PhantomData,
        }
    }
}

// Candidate for embedded_hal inclusion
/// Single input capture pin
pub trait CapturePin {
    /// Type  of value returned by capture
    type Capture;
    /// Enumeration of `Capture` errors
    ///
    /// Possible errors:
    ///
    /// - *overcapture*, the previous capture value was overwritten because it
    ///   was not read in a timely manner
    type Error;

    /// "Waits" for a transition in the capture `channel` and returns the value
    /// of counter at that instant
    fn capture(&mut self) -> nb::Result<Self::Capture, Self::Error>;
}

impl<C> CapturePin for Capture<C>
where
    TimerB7: CCRn<C>,
{
    type Capture = u16;
    type Error = OverCapture;

    #[inline]
    fn capture(&mut self) -> nb::Result<Self::Capture, Self::Error> {
        let (cov, ccifg) = CCRn::<C>::cov_ccifg_rd(&self.timer);
        if ccifg {
            let ccrn = CCRn::<C>::get_ccrn(&self.timer);
            CCRn::<C>::cov_ccifg_clr(&self.timer);
            if cov {
                Err(nb::Error::Other(OverCapture(ccrn)))
            } else {
                Ok(ccrn)
            }
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl<C> Capture<C>
where
    TimerB7: CCRn<C>,
{
    #[inline]
    /// Enable capture interrupts
    pub fn enable_interrupts(&mut self) {
        CCRn::<C>::ccie_set(&self.timer);
    }

    #[inline]
    /// Disable capture interrupts
    pub fn disable_interrupts(&mut self) {
        CCRn::<C>::ccie_clr(&self.timer);
    }

    #[inline]
    /// Current level of the selected capture input
    pub fn input(&self) -> bool {
        CCRn::<C>::cci_rd(&self.timer)
    }

    #[inline]
    /// Switch the capture input between GND (`false`) and VCC (`true`) and select the trigger
    /// edge. With a trigger on the matching edge this captures the counter from software.
    /// Synchronization and any capture that is already pending are left untouched.
    pub fn set_software_input(&mut self, high: bool, trigger: CapTrigger) {
        let ccis = if high { Ccis::Vcc } else { Ccis::Gnd };
        CCRn::<C>::config_ccis_cm(&self.timer, trigger.into(), ccis);
    }
}

/// Error returned when the previous capture was overwritten before being read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverCapture(pub u16);

/// Capture TBIV interrupt vector
pub enum CaptureVector {
    /// No pending interrupt
    NoInterrupt,
    /// Interrupt caused by capture register 1.
    Capture1(InterruptCapture<CCR1>),
    /// Interrupt caused by capture register 2.
    Capture2(InterruptCapture<CCR2>),
    /// Interrupt caused by capture register 3.
    Capture3(InterruptCapture<CCR3>),
    /// Interrupt caused by capture register 4.
    Capture4(InterruptCapture<CCR4>),
    /// Interrupt caused by capture register 5.
    Capture5(InterruptCapture<CCR5>),
    /// Interrupt caused by capture register 6.
    Capture6(InterruptCapture<CCR6>),
    /// Interrupt caused by main timer overflow
    MainTimer,
}

/// Token returned when reading the interrupt vector that allows a one-time read of the capture
/// register corresponding to the interrupt.
pub struct InterruptCapture<C>(PhantomData<C>);

impl<C> InterruptCapture<C>
where
    TimerB7: CCRn<C>,
{
    /// Performs a one-time capture read without considering the interrupt flag. Always call this
    /// instead of `capture()` after reading the capture interrupt vector, since reading the vector
    /// already clears the interrupt flag that `capture()` checks for.
    #[inline]
    pub fn interrupt_capture(self, cap: &mut Capture<C>) -> Result<u16, OverCapture> {
        let (cov, _) = CCRn::<C>::cov_ccifg_rd(&cap.timer);
        let ccrn = CCRn::<C>::get_ccrn(&cap.timer);
        if cov {
            CCRn::<C>::cov_ccifg_clr(&cap.timer);
            Err(OverCapture(ccrn))
        } else {
            Ok(ccrn)
        }
    }
}

/// Interrupt vector register for determining which capture-register caused an ISR
pub struct TBxIV(TimerB7);

impl TBxIV {
    #[inline]
    /// Read the capture interrupt vector and resets corresponding interrupt flag. If
    /// the vector corresponds to an available capture, a one-time capture read token will be
    /// returned as well.
    pub fn interrupt_vector(&mut self) -> CaptureVector {
        match read_tbxiv(&self.0) {
            TimerVector::NoInterrupt => CaptureVector::NoInterrupt,
            TimerVector::SubTimer1 => CaptureVector::Capture1(InterruptCapture(PhantomData)),
            TimerVector::SubTimer2 => CaptureVector::Capture2(InterruptCapture(PhantomData)),
            TimerVector::SubTimer3 => CaptureVector::Capture3(InterruptCapture(PhantomData)),
            TimerVector::SubTimer4 => CaptureVector::Capture4(InterruptCapture(PhantomData)),
            TimerVector::SubTimer5 => CaptureVector::Capture5(InterruptCapture(PhantomData)),
            TimerVector::SubTimer6 => CaptureVector::Capture6(InterruptCapture(PhantomData)),
            TimerVector::MainTimer => CaptureVector::MainTimer,
        }
    }

    /// Enable the overflow interrupt of the free-running capture timer
    #[inline]
    pub fn enable_overflow_interrupt(&mut self) {
        self.0.tbie_set();
    }

    /// Disable the overflow interrupt of the free-running capture timer
    #[inline]
    pub fn disable_overflow_interrupt(&mut self) {
        self.0.tbie_clr();
    }
}
