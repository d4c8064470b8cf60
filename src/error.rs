/// Failure classes surfaced by media, units and enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Block range or buffer length outside of what the medium can serve.
    OutOfBounds,
    /// The backend reported a transfer or protocol fault.
    DeviceFailure,
    /// Removable medium is absent.
    NotPresent,
    /// A binding or registration precondition was violated.
    Configuration,
    /// Write attempted on a read-only unit.
    WriteProtected,
    /// Card identification data did not validate.
    InconsistentState,
}
