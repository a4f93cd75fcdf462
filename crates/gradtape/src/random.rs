//! Random tensor construction for parameter initialization.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::scalar::Float;
use crate::strides::num_elements;
use crate::tensor::Tensor;

/// Floating-point types that can be sampled for initialization.
pub trait RandomFloat: Float {
    /// Sample from the uniform distribution on [0, 1).
    fn sample_uniform<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// Sample from the standard normal distribution.
    fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

macro_rules! impl_random_float {
    ($t:ty) => {
        impl RandomFloat for $t {
            fn sample_uniform<R: Rng + ?Sized>(rng: &mut R) -> Self {
                rng.sample::<$t, _>(StandardUniform)
            }

            fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
                rng.sample::<$t, _>(StandardNormal)
            }
        }
    };
}

impl_random_float!(f32);
impl_random_float!(f64);

impl<ElT: RandomFloat> Tensor<ElT> {
    /// Create a tensor with uniform random values in [0, 1).
    pub fn random(shape: &[usize]) -> Self {
        Self::random_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with uniform random values using a specific RNG.
    ///
    /// # Example
    ///
    /// ```
    /// use gradtape::Tensor;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let t1: Tensor<f64> = Tensor::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42));
    /// let t2: Tensor<f64> = Tensor::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42));
    /// assert_eq!(t1.data(), t2.data());
    /// ```
    pub fn random_with_rng<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        let mut t = Self::zeros(shape);
        for x in t.data_mut() {
            *x = ElT::sample_uniform(rng);
        }
        t
    }

    /// Create a tensor with standard normal random values.
    pub fn randn(shape: &[usize]) -> Self {
        Self::randn_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with standard normal random values using a specific RNG.
    pub fn randn_with_rng<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        Self::randn_std_with_rng(shape, ElT::one(), rng)
    }

    /// Normal initialization `N(0, std^2)`, the usual choice for weights.
    pub fn randn_std_with_rng<R: Rng + ?Sized>(shape: &[usize], std: ElT, rng: &mut R) -> Self {
        let data: Vec<ElT> = (0..num_elements(shape))
            .map(|_| ElT::sample_normal(rng) * std)
            .collect();
        let mut t = Self::zeros(shape);
        t.data_mut().copy_from_slice(&data);
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_in_unit_interval() {
        let t: Tensor<f32> = Tensor::random(&[4, 5]);
        assert_eq!(t.shape(), &[4, 5]);
        for &v in t.data() {
            assert!((0.0..1.0).contains(&v), "value {} not in [0, 1)", v);
        }
    }

    #[test]
    fn test_randn_reproducible() {
        let t1: Tensor<f64> = Tensor::randn_with_rng(&[3, 4], &mut StdRng::seed_from_u64(54321));
        let t2: Tensor<f64> = Tensor::randn_with_rng(&[3, 4], &mut StdRng::seed_from_u64(54321));
        assert_eq!(t1.data(), t2.data());
    }

    #[test]
    fn test_randn_std_scales_spread() {
        let mut rng = StdRng::seed_from_u64(7);
        let t: Tensor<f64> = Tensor::randn_std_with_rng(&[1000], 0.5, &mut rng);
        let mean = t.data().iter().sum::<f64>() / 1000.0;
        let var = t.data().iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 1000.0;
        assert!(mean.abs() < 0.1, "mean {} too far from 0", mean);
        assert!(var > 0.15 && var < 0.4, "variance {} too far from 0.25", var);
    }

    #[test]
    fn test_randn_does_not_track_gradients() {
        let t: Tensor<f32> = Tensor::randn(&[2]);
        assert!(!t.requires_grad());
    }
}
