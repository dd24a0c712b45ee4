use super::queue::COMMAND_ARGS;
use super::*;

/// Player opcodes that act on a running player, looked up by sound.
const PLAYER_COMMANDS: u32 = 0x78_3fff;
/// Player opcodes that act on one part of that player.
const PART_COMMANDS: u32 = 1 << 11 | 1 << 22;

/// What a player-level command resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Player(usize),
    Part(usize),
}

fn byte(value: i32) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::InvalidArgument(value))
}

fn word(value: i32) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::InvalidArgument(value))
}

fn signed(value: i32) -> Result<i8> {
    i8::try_from(value).map_err(|_| Error::InvalidArgument(value))
}

fn flag(value: i32) -> Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::InvalidArgument(value)),
    }
}

impl<D: Driver, S: SoundSource> Engine<D, S> {
    /// Script entry point.
    ///
    /// The low byte of the first argument is the opcode and the next byte
    /// selects engine (0) or player (1) commands. Failures return -1.
    pub fn do_command(&mut self, args: [i32; 8]) -> i32 {
        let [a, b, c, d, e, f, g, h] = args;
        let cmd = a & 0xff;
        let result = match (a >> 8) & 0xff {
            0 => self.engine_command(cmd, b, c),
            1 => self.player_command(cmd, [b, c, d, e, f, g, h]),
            _ => Err(Error::UnknownCommand(a)),
        };

        match result {
            Ok(value) => value,
            Err(Error::UnknownCommand(_)) => {
                warn!("unknown command 0x{:x}", a);
                -1
            }
            Err(err) => {
                debug!("command 0x{:x} failed: {}", a, err);
                -1
            }
        }
    }

    fn engine_command(&mut self, cmd: i32, b: i32, c: i32) -> Result<i32> {
        Ok(match cmd {
            2 | 3 => 0,
            6 => {
                self.set_master_volume(byte(b)?);
                0
            }
            7 => self.master_volume as i32,
            8 => {
                if self.start_sound(word(b)?) {
                    0
                } else {
                    -1
                }
            }
            9 => self.stop_sound(word(b)?),
            10 | 11 => self.stop_all_sounds(),
            13 => self.get_sound_status(word(b)?),
            16 => {
                self.set_volchan(word(b)?, word(c)?)?;
                0
            }
            17 => {
                self.set_channel_volume(word(b)?, word(c)?)?;
                0
            }
            18 => {
                self.set_volchan_entry(word(b)?, word(c)?)?;
                0
            }
            _ => return Err(Error::UnknownCommand(cmd)),
        })
    }

    fn resolve(&mut self, cmd: i32, sound: i32, chan: i32) -> Result<Option<Target>> {
        let bit = match u32::try_from(cmd).ok().filter(|&cmd| cmd < 32) {
            Some(cmd) => 1u32 << cmd,
            None => return Ok(None),
        };
        if bit & PLAYER_COMMANDS == 0 {
            return Ok(None);
        }

        let p = self.find_player(word(sound)?).ok_or(Error::NotActive)?;
        if bit & PART_COMMANDS == 0 {
            return Ok(Some(Target::Player(p)));
        }

        let chan = byte(chan).ok().filter(|&chan| chan < 16).ok_or(Error::InvalidArgument(chan))?;
        let i = self.get_part(p, chan).ok_or(Error::InvalidArgument(chan as i32))?;
        Ok(Some(Target::Part(i)))
    }

    fn player_command(&mut self, cmd: i32, args: [i32; COMMAND_ARGS]) -> Result<i32> {
        let [b, c, d, ..] = args;

        match self.resolve(cmd, b, c)? {
            Some(Target::Part(i)) => {
                match cmd {
                    11 => self.part_set_onoff(i, d != 0),
                    _ => {
                        let volume = byte(d).ok().filter(|&v| v <= 127).ok_or(Error::InvalidArgument(d))?;
                        self.update_part(i, |part, owner| part.set_vol(volume, owner));
                    }
                }
                Ok(0)
            }
            Some(Target::Player(p)) => self.player_target_command(p, cmd, args),
            None => Ok(match cmd {
                14 => {
                    self.queue.enqueue_trigger(word(b)?, byte(c)?)?;
                    0
                }
                15 => {
                    self.queue.enqueue_command(args)?;
                    0
                }
                16 => {
                    self.queue.clear();
                    0
                }
                23 => self.queue.query(b),
                24 => 0,
                _ => return Err(Error::UnknownCommand(cmd)),
            }),
        }
    }

    fn player_target_command(&mut self, p: usize, cmd: i32, args: [i32; COMMAND_ARGS]) -> Result<i32> {
        let [_, c, d, e, f, g, _] = args;

        Ok(match cmd {
            0 | 19 => self.get_param(p, c, d),
            1 => {
                self.set_player_priority(p, byte(c)?);
                0
            }
            2 => {
                self.set_player_vol(p, byte(c)?)?;
                0
            }
            3 => {
                self.set_player_pan(p, signed(c)?.clamp(-64, 63));
                0
            }
            4 => {
                self.set_player_transpose(p, flag(c)?, d)?;
                0
            }
            5 => {
                self.set_player_detune(p, signed(c)?);
                0
            }
            6 => {
                self.set_speed(p, byte(c)?);
                0
            }
            7 => {
                self.jump(p, word(c)?, word(d)? as u32, word(e)? as u32)?;
                0
            }
            8 => {
                self.scan(p, word(c)?, word(d)? as u32, word(e)? as u32)?;
                0
            }
            9 => {
                self.set_loop(p, word(c)?, word(d)?, word(e)?, word(f)?, word(g)?)?;
                0
            }
            10 => {
                self.clear_loop(p);
                0
            }
            12 | 20 => {
                self.players[p].hook.set(c, d, e)?;
                0
            }
            13 => {
                self.fade_vol(p, byte(c)?, word(d)?)?;
                0
            }
            21 => -1,
            _ => return Err(Error::UnknownCommand(cmd)),
        })
    }
}
