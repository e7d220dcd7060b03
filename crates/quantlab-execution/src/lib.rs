//! 마켓 시뮬레이터 크레이트.
//!
//! 순수·동기 시뮬레이터입니다. 캔들 하나를 입력받아 포지션 수명주기
//! (손절/익절/트레일링), 수수료, 슬리피지를 결정적으로 처리합니다.
//! 같은 입력이면 거래 시퀀스는 바이트 단위로 동일합니다.

pub mod simulator;

pub use simulator::{FillModel, MarketSimulator, SimulatorConfig};
