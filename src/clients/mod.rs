pub mod printer;
pub mod rbmq;
