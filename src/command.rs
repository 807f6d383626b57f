use crate::esy::RegisterWrite;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetHold(u16, u16),
    SetMode(u16),
    WriteMulti(Vec<RegisterWrite>),
    ReadHold(u16, u16),
    Poll(Option<Vec<u16>>),
    ReloadDefinition,
}

impl Command {
    pub fn is_write(&self) -> bool {
        use Command::*;
        matches!(self, SetHold(..) | SetMode(_) | WriteMulti(_))
    }

    pub fn to_result_topic(&self, serial: &str) -> String {
        use Command::*;

        let rest = match self {
            SetHold(register, _) => format!("set/hold/{}", register),
            SetMode(_) => "set/mode".to_owned(),
            WriteMulti(_) => "set/multi".to_owned(),
            ReadHold(register, _) => format!("read/hold/{}", register),
            Poll(_) => "read/poll".to_owned(),
            ReloadDefinition => "reload_definition".to_owned(),
        };

        format!("result/{}/{}", serial, rest)
    }
}
