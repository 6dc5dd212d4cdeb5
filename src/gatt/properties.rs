#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicProperty {
    Read,
    WriteWithoutResponse,
    Write,
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributePermission {
    Readable,
    Writeable,
}
