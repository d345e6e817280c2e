/// Response type for the `Module::call` method.
///
/// Events emitted by a call are collected on the working set.
#[derive(Default, Debug, PartialEq, Eq)]
pub struct CallResponse {}
