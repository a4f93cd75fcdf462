//! Scalar traits for tensor element types.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::backend::gemm_column_major;

/// Element type tag carried by every tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
}

impl DType {
    /// Whether values of this type can carry gradients.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Size of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }
}

/// Trait for element types supported by gradtape tensors.
pub trait Scalar:
    Copy
    + Debug
    + Default
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// Runtime tag for this element type.
    const DTYPE: DType;

    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::default()
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self;

    /// Lossy conversion used for reporting and label decoding.
    fn to_f64(self) -> f64;

    /// Lossy conversion from `f64` (truncating for integer types).
    fn from_f64(value: f64) -> Self;
}

/// Floating-point scalars: the only element types that take part in
/// differentiation and optimization.
pub trait Float: Scalar + Div<Output = Self> + Neg<Output = Self> {
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn tanh(self) -> Self;
    fn sqrt(self) -> Self;
    fn powi(self, n: i32) -> Self;

    /// Column-major GEMM: `op(a) @ op(b)` where `op` optionally transposes.
    ///
    /// `a` is stored as `a_rows x a_cols`, `b` as `b_rows x b_cols`.
    #[allow(clippy::too_many_arguments)]
    fn gemm(
        a: &[Self],
        a_rows: usize,
        a_cols: usize,
        transpose_a: bool,
        b: &[Self],
        b_rows: usize,
        b_cols: usize,
        transpose_b: bool,
    ) -> Vec<Self>;
}

macro_rules! impl_scalar_int {
    ($t:ty, $dtype:expr) => {
        impl Scalar for $t {
            const DTYPE: DType = $dtype;

            fn one() -> Self {
                1
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }
        }
    };
}

macro_rules! impl_scalar_float {
    ($t:ty, $dtype:expr) => {
        impl Scalar for $t {
            const DTYPE: DType = $dtype;

            fn one() -> Self {
                1.0
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }
        }

        impl Float for $t {
            fn exp(self) -> Self {
                <$t>::exp(self)
            }

            fn ln(self) -> Self {
                <$t>::ln(self)
            }

            fn tanh(self) -> Self {
                <$t>::tanh(self)
            }

            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }

            fn powi(self, n: i32) -> Self {
                <$t>::powi(self, n)
            }

            fn gemm(
                a: &[Self],
                a_rows: usize,
                a_cols: usize,
                transpose_a: bool,
                b: &[Self],
                b_rows: usize,
                b_cols: usize,
                transpose_b: bool,
            ) -> Vec<Self> {
                gemm_column_major::<$t>(
                    a,
                    (a_rows, a_cols),
                    transpose_a,
                    b,
                    (b_rows, b_cols),
                    transpose_b,
                    1.0,
                )
            }
        }
    };
}

impl_scalar_int!(i32, DType::I32);
impl_scalar_int!(i64, DType::I64);
impl_scalar_float!(f32, DType::F32);
impl_scalar_float!(f64, DType::F64);
