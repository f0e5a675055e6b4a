pub mod attribution;
pub mod config;
pub mod corpus;
pub mod estimator;
pub mod grammar;
pub mod markov;
pub mod tokenizer;
pub mod transitions;
