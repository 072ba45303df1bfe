pub mod similarity;
pub mod work;
