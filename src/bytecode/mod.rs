pub mod image;
pub mod op_code;
pub mod operand;
pub mod xse;

#[cfg(test)]
mod image_test;
