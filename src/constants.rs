pub const MAX_ITER: usize = 100;
pub const H_TOL: f64 = 1e-8;
pub const RHO_INIT: f64 = 1.0;
pub const RHO_MAX: f64 = 1e16;
pub const RHO_GROWTH: f64 = 10.0;
pub const H_PROGRESS: f64 = 0.25;
pub const MAX_INNER_ITER: usize = 2000;
pub const INNER_TOL: f64 = 1e-10;
pub const MAX_VARIABLES: usize = 500;
pub const EXPM_TAYLOR_TERMS: usize = 18;
pub const STEP_MIN: f64 = 1e-12;
pub const STEP_MAX: f64 = 1e12;
pub const ARMIJO_C: f64 = 1e-4;
pub const NONMONOTONE_WINDOW: usize = 10;
/// Mixed into the refuter seed so its draws never replay a data generator seeded alike.
pub const REFUTE_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;
