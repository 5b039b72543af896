pub(crate) mod combination;
pub(crate) mod generator;
