pub mod ast;
pub mod error;
pub mod expression;
pub mod grammar;
pub mod parser;
pub mod printer;
pub mod scanner;
pub mod stack;
pub mod token;
