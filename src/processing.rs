//! Signal processing helpers.
use std::f64::consts::PI;
use std::str::FromStr;

use crate::error::SNNError;

/// The window used by the moving average in [`smooth`].
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Window {
    Flat,
    Hanning,
    Hamming,
    Bartlett,
    Blackman,
}

impl FromStr for Window {
    type Err = SNNError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(Window::Flat),
            "hanning" => Ok(Window::Hanning),
            "hamming" => Ok(Window::Hamming),
            "bartlett" => Ok(Window::Bartlett),
            "blackman" => Ok(Window::Blackman),
            _ => Err(SNNError::UnknownWindow(s.to_string())),
        }
    }
}

impl Window {
    /// Returns the (unnormalized) window coefficients of the given length.
    pub fn coefficients(&self, len: usize) -> Vec<f64> {
        if len == 1 {
            return vec![1.0];
        }
        let m = (len - 1) as f64;
        (0..len)
            .map(|n| {
                let n = n as f64;
                match self {
                    Window::Flat => 1.0,
                    Window::Hanning => 0.5 - 0.5 * (2.0 * PI * n / m).cos(),
                    Window::Hamming => 0.54 - 0.46 * (2.0 * PI * n / m).cos(),
                    Window::Bartlett => 2.0 / m * (m / 2.0 - (n - m / 2.0).abs()),
                    Window::Blackman => {
                        0.42 - 0.5 * (2.0 * PI * n / m).cos() + 0.08 * (4.0 * PI * n / m).cos()
                    }
                }
            })
            .collect()
    }
}

/// Smooth a signal with a normalized moving window.
///
/// The signal is extended by reflecting `window_len - 1` samples at both ends, so the output has
/// `x.len() + window_len - 1` samples. Windows shorter than 3 samples leave the signal untouched.
pub fn smooth(x: &[f64], window_len: usize, window: Window) -> Result<Vec<f64>, SNNError> {
    if x.len() < window_len {
        return Err(SNNError::InvalidParameters(
            "Input vector needs to be bigger than window size".to_string(),
        ));
    }
    if window_len < 3 {
        return Ok(x.to_vec());
    }

    let n = x.len();
    let padded: Vec<f64> = x[1..window_len]
        .iter()
        .rev()
        .chain(x.iter())
        .chain(x[n - window_len..n - 1].iter().rev())
        .copied()
        .collect();

    let coefficients = window.coefficients(window_len);
    let total: f64 = coefficients.iter().sum();
    let coefficients: Vec<f64> = coefficients.iter().map(|c| c / total).collect();

    Ok(padded
        .windows(window_len)
        .map(|chunk| {
            chunk
                .iter()
                .zip(coefficients.iter().rev())
                .map(|(s, c)| s * c)
                .sum()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_window_from_str() {
        assert_eq!("hanning".parse::<Window>(), Ok(Window::Hanning));
        assert_eq!("flat".parse::<Window>(), Ok(Window::Flat));
        assert_eq!(
            "gaussian".parse::<Window>(),
            Err(SNNError::UnknownWindow("gaussian".to_string()))
        );
    }

    #[test]
    fn test_window_coefficients() {
        let hanning = Window::Hanning.coefficients(5);
        for (c, e) in hanning.iter().zip([0.0, 0.5, 1.0, 0.5, 0.0]) {
            assert_relative_eq!(*c, e, epsilon = 1e-12);
        }
        let bartlett = Window::Bartlett.coefficients(5);
        for (c, e) in bartlett.iter().zip([0.0, 0.5, 1.0, 0.5, 0.0]) {
            assert_relative_eq!(*c, e, epsilon = 1e-12);
        }
        let blackman = Window::Blackman.coefficients(3);
        assert_relative_eq!(blackman[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_smooth_flat() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = smooth(&x, 3, Window::Flat).unwrap();
        // padded: [3, 2, 1, 2, 3, 4, 5, 4, 3]
        let expected = [2.0, 5.0 / 3.0, 2.0, 3.0, 4.0, 13.0 / 3.0, 4.0];
        assert_eq!(y.len(), expected.len());
        for (a, b) in y.iter().zip(expected) {
            assert_relative_eq!(*a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_smooth_constant_signal() {
        let x = vec![2.5; 32];
        for window in [Window::Hanning, Window::Hamming, Window::Bartlett, Window::Blackman] {
            let y = smooth(&x, 11, window).unwrap();
            assert_eq!(y.len(), 32 + 10);
            y.iter().for_each(|v| assert_relative_eq!(*v, 2.5, epsilon = 1e-12));
        }
    }

    #[test]
    fn test_smooth_edge_cases() {
        assert!(smooth(&[1.0, 2.0], 3, Window::Flat).is_err());
        assert_eq!(smooth(&[1.0, 2.0], 2, Window::Hanning), Ok(vec![1.0, 2.0]));
    }
}
