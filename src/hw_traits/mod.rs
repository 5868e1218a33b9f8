pub mod timerb;
