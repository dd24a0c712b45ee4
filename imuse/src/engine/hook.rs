use crate::{Error, Result};

/// Arming values for the conditional events of one player.
///
/// A hooked event carries a command byte. Command 0 always fires; any other
/// command fires only when the matching slot holds the same value, and
/// commands below 0x80 disarm the slot when they fire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HookDatas {
    pub(crate) jump: u8,
    pub(crate) transpose: u8,
    pub(crate) part_onoff: [u8; 16],
    pub(crate) part_volume: [u8; 16],
    pub(crate) part_program: [u8; 16],
    pub(crate) part_transpose: [u8; 16],
}

/// Checks a hooked event against its slot.
pub(crate) fn fire(slot: &mut u8, cmd: u8) -> bool {
    if cmd != 0 {
        if *slot != cmd {
            return false;
        }
        if cmd < 0x80 {
            *slot = 0;
        }
    }
    true
}

impl HookDatas {
    /// Arms slot class `cls` (0 jump, 1 transpose, 2-5 part on/off, volume,
    /// program and transpose). Channel 16 arms a part class on every channel.
    pub(crate) fn set(&mut self, cls: i32, value: i32, chan: i32) -> Result<()> {
        let value = u8::try_from(value).map_err(|_| Error::InvalidArgument(value))?;
        let table = match cls {
            0 => {
                self.jump = value;
                return Ok(());
            }
            1 => {
                self.transpose = value;
                return Ok(());
            }
            2 => &mut self.part_onoff,
            3 => &mut self.part_volume,
            4 => &mut self.part_program,
            5 => &mut self.part_transpose,
            _ => return Err(Error::InvalidArgument(cls)),
        };

        match chan {
            0..=15 => table[chan as usize] = value,
            16 => *table = [value; 16],
            _ => return Err(Error::InvalidArgument(chan)),
        }
        Ok(())
    }

    /// Value of a hook slot as reported by player parameters 18 to 23.
    pub(crate) fn query(&self, param: i32, chan: i32) -> i32 {
        let table = match param {
            18 => return self.jump as i32,
            19 => return self.transpose as i32,
            20 => &self.part_onoff,
            21 => &self.part_volume,
            22 => &self.part_program,
            23 => &self.part_transpose,
            _ => return -1,
        };
        match usize::try_from(chan).ok().and_then(|chan| table.get(chan)) {
            Some(&value) => value as i32,
            None => -1,
        }
    }
}
