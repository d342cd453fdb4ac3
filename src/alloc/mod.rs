pub(crate) mod busy;
pub mod global;
pub mod ledger;
pub mod manual;
pub mod registry;
pub mod track;
