//! 지표 공통 수치 유틸리티.
//!
//! 워밍업 구간은 None으로 채워 입력과 같은 길이를 유지합니다.

/// 단순 이동평균. 처음 `period - 1`개는 None.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut window_sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(window_sum / period as f64);
    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        out[i] = Some(window_sum / period as f64);
    }
    out
}

/// 지수 이동평균. SMA(period)로 시드, α = 2/(period+1).
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(seed);
    let mut prev = seed;
    for i in period..values.len() {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        out[i] = Some(prev);
    }
    out
}

/// 평활 이동평균(Wilder). SMA(period)로 시드,
/// `smma = (smma_prev·(period−1) + x)/period`.
pub fn smma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(seed);
    let mut prev = seed;
    let n = period as f64;
    for i in period..values.len() {
        prev = (prev * (n - 1.0) + values[i]) / n;
        out[i] = Some(prev);
    }
    out
}

/// Option 시퀀스에 대한 지수 이동평균.
///
/// 앞쪽 None 구간(워밍업)을 건너뛰고 유효 구간에서 계산합니다.
/// MACD 신호선처럼 이미 워밍업이 있는 시퀀스에 사용합니다.
pub fn ema_over_options(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let Some(offset) = values.iter().position(Option::is_some) else {
        return out;
    };
    let tail: Vec<f64> = values[offset..].iter().filter_map(|v| *v).collect();
    for (i, v) in ema(&tail, period).into_iter().enumerate() {
        out[offset + i] = v;
    }
    out
}

/// Option 시퀀스에 대한 단순 이동평균 (스토캐스틱 %K 평활 등).
pub fn sma_over_options(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let Some(offset) = values.iter().position(Option::is_some) else {
        return out;
    };
    let tail: Vec<f64> = values[offset..].iter().filter_map(|v| *v).collect();
    for (i, v) in sma(&tail, period).into_iter().enumerate() {
        out[offset + i] = v;
    }
    out
}

/// 모집단 표준편차.
pub fn stddev_population(window: &[f64]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let variance = window
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / window.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_warmup_and_values() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[4], Some(4.0));
    }

    #[test]
    fn test_ema_seeded_by_sma() {
        let out = ema(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out[2], Some(2.0));
        // α = 0.5 → 0.5·4 + 0.5·2 = 3
        assert_eq!(out[3], Some(3.0));
    }

    #[test]
    fn test_smma_recurrence() {
        let out = smma(&[1.0, 2.0, 3.0, 6.0], 3);
        assert_eq!(out[2], Some(2.0));
        // (2·2 + 6)/3 = 10/3
        assert!((out[3].unwrap() - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ema_over_options_preserves_offset() {
        let values = [None, None, Some(1.0), Some(2.0), Some(3.0)];
        let out = ema_over_options(&values, 2);
        assert_eq!(out[2], None);
        assert_eq!(out[3], Some(1.5));
    }

    #[test]
    fn test_stddev_population() {
        let sd = stddev_population(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.0).abs() < 1e-12);
    }
}
