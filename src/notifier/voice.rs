//! Voice-call variant, used by the test-call IPC actions
//! (`send_test_syren`'s call path) rather than the retry queue proper
//!.

use std::time::Duration;

use crate::error::NotifyError;
use crate::notifier::sms::GsmModem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtmfTone {
    /// `111`: alert call.
    Alert,
    /// `00000`: panic call.
    Panic,
    /// `5`: test call.
    Test,
}

impl DtmfTone {
    fn digits(self) -> &'static str {
        match self {
            DtmfTone::Alert => "111",
            DtmfTone::Panic => "00000",
            DtmfTone::Test => "5",
        }
    }
}

const COVERAGE_WAIT_VOICE: Duration = Duration::from_secs(30);

/// Dials `number`, waits for pickup, plays `tone`, then hangs up. The
/// call is "acknowledged" only if the called party returns DTMF `1`
/// (checked by the caller against the modem's reported response).
pub fn place_call(modem: &mut GsmModem, number: &str, tone: DtmfTone) -> Result<bool, NotifyError> {
    std::thread::sleep(COVERAGE_WAIT_VOICE);
    modem.dial(number)?;
    modem.wait_for_answer()?;
    let acknowledged = modem.send_dtmf_and_listen(tone.digits())?;
    modem.hang_up()?;
    Ok(acknowledged)
}
