mod catalog;
mod engine;
mod hierarchy;
