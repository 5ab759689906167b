//! Numeric error-reply table.
//!
//! The table is fixed: a numeric code either maps to one [`ErrorKind`] or it
//! is an ordinary reply.

macro_rules! error_kinds {
    ($($variant:ident = $code:literal => $name:literal,)*) => {
        /// One kind per recognized numeric error code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorKind {
            $($variant,)*
        }

        impl ErrorKind {
            /// Look up a numeric token such as `"433"`.
            pub fn from_code(code: &str) -> Option<ErrorKind> {
                match code {
                    $($code => Some(ErrorKind::$variant),)*
                    _ => None,
                }
            }

            pub fn code(self) -> &'static str {
                match self {
                    $(ErrorKind::$variant => $code,)*
                }
            }

            /// Symbolic name without the `ERR_` prefix, e.g. `NICKNAMEINUSE`.
            pub fn name(self) -> &'static str {
                match self {
                    $(ErrorKind::$variant => $name,)*
                }
            }
        }
    };
}

error_kinds! {
    NoSuchNick = "401" => "NOSUCHNICK",
    NoSuchServer = "402" => "NOSUCHSERVER",
    NoSuchChannel = "403" => "NOSUCHCHANNEL",
    CannotSendToChan = "404" => "CANNOTSENDTOCHAN",
    TooManyChannels = "405" => "TOOMANYCHANNELS",
    TooManyTargets = "407" => "TOOMANYTARGETS",
    NoRecipient = "411" => "NORECIPIENT",
    NoTextToSend = "412" => "NOTEXTTOSEND",
    NoTopLevel = "413" => "NOTOPLEVEL",
    WildTopLevel = "414" => "WILDTOPLEVEL",
    NoNicknameGiven = "431" => "NONICKNAMEGIVEN",
    ErroneousNickname = "432" => "ERRONEUSNICKNAME",
    NicknameInUse = "433" => "NICKNAMEINUSE",
    NickCollision = "436" => "NICKCOLLISION",
    UnavailResource = "437" => "UNAVAILRESOURCE",
    UserNotInChannel = "441" => "USERNOTINCHANNEL",
    NotOnChannel = "442" => "NOTONCHANNEL",
    UserOnChannel = "443" => "USERONCHANNEL",
    NeedMoreParams = "461" => "NEEDMOREPARAMS",
    AlreadyRegistered = "462" => "ALREADYREGISTRED",
    PasswdMismatch = "464" => "PASSWDMISMATCH",
    KeySet = "467" => "KEYSET",
    ChannelIsFull = "471" => "CHANNELISFULL",
    UnknownMode = "472" => "UNKNOWNMODE",
    InviteOnlyChan = "473" => "INVITEONLYCHAN",
    BannedFromChan = "474" => "BANNEDFROMCHAN",
    BadChannelKey = "475" => "BADCHANNELKEY",
    BadChanMask = "476" => "BADCHANMASK",
    NoChanModes = "477" => "NOCHANMODES",
    NoPrivileges = "481" => "NOPRIVILEGES",
    ChanOPrivsNeeded = "482" => "CHANOPRIVSNEEDED",
    CantKillServer = "483" => "CANTKILLSERVER",
    Restricted = "484" => "RESTRICTED",
    NoOperHost = "491" => "NOOPERHOST",
    UModeUnknownFlag = "501" => "UMODEUNKNOWNFLAG",
    UsersDontMatch = "502" => "USERSDONTMATCH",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(ErrorKind::from_code("433"), Some(ErrorKind::NicknameInUse));
        assert_eq!(ErrorKind::from_code("482"), Some(ErrorKind::ChanOPrivsNeeded));
        assert_eq!(ErrorKind::NoSuchNick.code(), "401");
        assert_eq!(ErrorKind::AlreadyRegistered.name(), "ALREADYREGISTRED");
    }

    #[test]
    fn test_unrecognized_numerics_are_not_errors() {
        assert_eq!(ErrorKind::from_code("353"), None);
        assert_eq!(ErrorKind::from_code("400"), None);
        assert_eq!(ErrorKind::from_code("PRIVMSG"), None);
    }
}
