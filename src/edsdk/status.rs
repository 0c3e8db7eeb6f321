//! EDSDK status codes and their printable names.
//!
//! Every SDK entry point reports an `EdsError` value; zero is success. The
//! table below carries the codes this tool actually runs into so diagnostics
//! read as `EDS_ERR_FILE_NOT_FOUND (0x00000022)` instead of a bare number.

use std::fmt;

/// Raw status value returned by an EDSDK call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdsStatus(pub u32);

impl EdsStatus {
    pub const OK: EdsStatus = EdsStatus(0x0000_0000);
    pub const UNIMPLEMENTED: EdsStatus = EdsStatus(0x0000_0001);
    pub const INTERNAL_ERROR: EdsStatus = EdsStatus(0x0000_0002);
    pub const NOT_SUPPORTED: EdsStatus = EdsStatus(0x0000_0007);
    pub const FILE_NOT_FOUND: EdsStatus = EdsStatus(0x0000_0022);
    pub const FILE_OPEN_ERROR: EdsStatus = EdsStatus(0x0000_0023);
    pub const DIR_NOT_FOUND: EdsStatus = EdsStatus(0x0000_0040);
    pub const PROPERTIES_UNAVAILABLE: EdsStatus = EdsStatus(0x0000_0034);
    pub const DEVICE_NOT_FOUND: EdsStatus = EdsStatus(0x0000_0081);
    pub const DEVICE_BUSY: EdsStatus = EdsStatus(0x0000_0082);

    #[must_use]
    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Symbolic name from the EDSDK error header, if the code is known.
    #[must_use]
    pub fn name(self) -> &'static str {
        for (code, name) in STATUS_NAMES {
            if *code == self.0 {
                return name;
            }
        }
        "EDS_ERR_UNKNOWN"
    }
}

impl fmt::Display for EdsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

/// Code/name pairs lifted from `EDSDKErrors.h`.
static STATUS_NAMES: &[(u32, &str)] = &[
    (0x0000_0000, "EDS_ERR_OK"),
    (0x0000_0001, "EDS_ERR_UNIMPLEMENTED"),
    (0x0000_0002, "EDS_ERR_INTERNAL_ERROR"),
    (0x0000_0003, "EDS_ERR_MEM_ALLOC_FAILED"),
    (0x0000_0004, "EDS_ERR_MEM_FREE_FAILED"),
    (0x0000_0005, "EDS_ERR_OPERATION_CANCELLED"),
    (0x0000_0006, "EDS_ERR_INCOMPATIBLE_VERSION"),
    (0x0000_0007, "EDS_ERR_NOT_SUPPORTED"),
    (0x0000_0008, "EDS_ERR_UNEXPECTED_EXCEPTION"),
    (0x0000_0009, "EDS_ERR_PROTECTION_VIOLATION"),
    (0x0000_000A, "EDS_ERR_MISSING_SUBCOMPONENT"),
    (0x0000_000B, "EDS_ERR_SELECTION_UNAVAILABLE"),
    (0x0000_0020, "EDS_ERR_FILE_IO_ERROR"),
    (0x0000_0021, "EDS_ERR_FILE_TOO_MANY_OPEN"),
    (0x0000_0022, "EDS_ERR_FILE_NOT_FOUND"),
    (0x0000_0023, "EDS_ERR_FILE_OPEN_ERROR"),
    (0x0000_0024, "EDS_ERR_FILE_CLOSE_ERROR"),
    (0x0000_0025, "EDS_ERR_FILE_SEEK_ERROR"),
    (0x0000_0026, "EDS_ERR_FILE_TELL_ERROR"),
    (0x0000_0027, "EDS_ERR_FILE_READ_ERROR"),
    (0x0000_0028, "EDS_ERR_FILE_WRITE_ERROR"),
    (0x0000_0029, "EDS_ERR_FILE_PERMISSION_ERROR"),
    (0x0000_002A, "EDS_ERR_FILE_DISK_FULL_ERROR"),
    (0x0000_002B, "EDS_ERR_FILE_ALREADY_EXISTS"),
    (0x0000_0034, "EDS_ERR_PROPERTIES_UNAVAILABLE"),
    (0x0000_0035, "EDS_ERR_PROPERTIES_MISMATCH"),
    (0x0000_0040, "EDS_ERR_DIR_NOT_FOUND"),
    (0x0000_0041, "EDS_ERR_DIR_IO_ERROR"),
    (0x0000_0042, "EDS_ERR_DIR_ENTRY_NOT_FOUND"),
    (0x0000_0043, "EDS_ERR_DIR_ENTRY_EXISTS"),
    (0x0000_0044, "EDS_ERR_DIR_NOT_EMPTY"),
    (0x0000_0081, "EDS_ERR_DEVICE_NOT_FOUND"),
    (0x0000_0082, "EDS_ERR_DEVICE_BUSY"),
    (0x0000_0083, "EDS_ERR_DEVICE_INVALID"),
    (0x0000_0084, "EDS_ERR_DEVICE_EMERGENCY"),
    (0x0000_0085, "EDS_ERR_DEVICE_MEMORY_FULL"),
    (0x0000_0086, "EDS_ERR_DEVICE_INTERNAL_ERROR"),
    (0x0000_0087, "EDS_ERR_DEVICE_INVALID_PARAMETER"),
    (0x0000_0088, "EDS_ERR_DEVICE_NO_DISK"),
    (0x0000_0089, "EDS_ERR_DEVICE_DISK_ERROR"),
    (0x0000_008A, "EDS_ERR_DEVICE_CF_GATE_CHANGED"),
    (0x0000_008B, "EDS_ERR_DEVICE_DIAL_CHANGED"),
    (0x0000_008C, "EDS_ERR_DEVICE_NOT_INSTALLED"),
    (0x0000_008D, "EDS_ERR_DEVICE_STAY_AWAKE"),
    (0x0000_008E, "EDS_ERR_DEVICE_NOT_RELEASED"),
    (0x0000_00A0, "EDS_ERR_STREAM_IO_ERROR"),
    (0x0000_00A1, "EDS_ERR_STREAM_NOT_OPEN"),
    (0x0000_00A2, "EDS_ERR_STREAM_ALREADY_OPEN"),
    (0x0000_00A3, "EDS_ERR_STREAM_OPEN_ERROR"),
    (0x0000_00A4, "EDS_ERR_STREAM_CLOSE_ERROR"),
    (0x0000_00A5, "EDS_ERR_STREAM_SEEK_ERROR"),
    (0x0000_00A6, "EDS_ERR_STREAM_TELL_ERROR"),
    (0x0000_00A7, "EDS_ERR_STREAM_READ_ERROR"),
    (0x0000_00A8, "EDS_ERR_STREAM_WRITE_ERROR"),
    (0x0000_00A9, "EDS_ERR_STREAM_PERMISSION_ERROR"),
    (0x0000_00AA, "EDS_ERR_STREAM_COULDNT_BEGIN_THREAD"),
    (0x0000_00AB, "EDS_ERR_STREAM_BAD_OPTIONS"),
    (0x0000_00AC, "EDS_ERR_STREAM_END_OF_STREAM"),
    (0x0000_00C0, "EDS_ERR_COMM_PORT_IS_IN_USE"),
    (0x0000_00C1, "EDS_ERR_COMM_DISCONNECTED"),
    (0x0000_00C2, "EDS_ERR_COMM_DEVICE_INCOMPATIBLE"),
    (0x0000_00C3, "EDS_ERR_COMM_BUFFER_FULL"),
    (0x0000_00C4, "EDS_ERR_COMM_USB_BUS_ERR"),
    (0x0000_8D01, "EDS_ERR_TAKE_PICTURE_AF_NG"),
    (0x0000_8D07, "EDS_ERR_TAKE_PICTURE_CARD_NG"),
    (0x0000_8D08, "EDS_ERR_TAKE_PICTURE_CARD_PROTECT_NG"),
];
