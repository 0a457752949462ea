use std::fmt;
use std::ops::{Index, IndexMut};

/// Logical use of an audio stream, as declared by the application playing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamType {
    /// Telephony voice.
    VoiceCall,
    /// System sounds (key clicks, UI feedback).
    System,
    /// Ringtone.
    Ring,
    /// Music and general media playback.
    Music,
    /// Alarm clock.
    Alarm,
    /// Notifications.
    Notification,
    /// Voice carried over a bluetooth SCO link.
    BluetoothSco,
    /// Sounds that must stay audible (e.g. camera shutter where mandated).
    EnforcedAudible,
    /// Dial pad tones.
    Dtmf,
    /// Text to speech.
    Tts,
}

impl StreamType {
    /// Number of stream types.
    pub const COUNT: usize = 10;

    /// Every stream type, in table order.
    pub const ALL: [StreamType; Self::COUNT] = [
        Self::VoiceCall,
        Self::System,
        Self::Ring,
        Self::Music,
        Self::Alarm,
        Self::Notification,
        Self::BluetoothSco,
        Self::EnforcedAudible,
        Self::Dtmf,
        Self::Tts,
    ];

    /// Position of this stream type in [`Self::ALL`] and in every [`StreamTable`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Routing strategy of this stream type. Shorthand for [`strategy_for`].
    pub const fn strategy(self) -> Strategy {
        strategy_for(self)
    }

    /// Stream types whose gain also drives the call audio path.
    pub const fn is_call_adjacent(self) -> bool {
        matches!(self, Self::VoiceCall | Self::Dtmf | Self::BluetoothSco)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VoiceCall => "voice_call",
            Self::System => "system",
            Self::Ring => "ring",
            Self::Music => "music",
            Self::Alarm => "alarm",
            Self::Notification => "notification",
            Self::BluetoothSco => "bluetooth_sco",
            Self::EnforcedAudible => "enforced_audible",
            Self::Dtmf => "dtmf",
            Self::Tts => "tts",
        };
        f.write_str(name)
    }
}

/// Group of stream types sharing one routing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Media playback.
    Media,
    /// Telephony.
    Phone,
    /// Ringtones, alarms and notifications.
    Sonification,
    /// Dial pad tones.
    Dtmf,
}

impl Strategy {
    /// Order in which strategies compete for a shared sink. The first active one wins.
    pub const PRIORITY: [Strategy; 4] = [Self::Phone, Self::Sonification, Self::Media, Self::Dtmf];

    /// Stream types resolving to this strategy.
    pub fn streams(self) -> impl Iterator<Item = StreamType> {
        StreamType::ALL
            .into_iter()
            .filter(move |stream| stream.strategy() == self)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Media => "media",
            Self::Phone => "phone",
            Self::Sonification => "sonification",
            Self::Dtmf => "dtmf",
        };
        f.write_str(name)
    }
}

/// Maps a stream type to its routing strategy.
///
/// System sounds follow media so that key clicks never pull music to another output.
pub const fn strategy_for(stream: StreamType) -> Strategy {
    match stream {
        StreamType::VoiceCall | StreamType::BluetoothSco => Strategy::Phone,
        StreamType::Ring
        | StreamType::Notification
        | StreamType::Alarm
        | StreamType::EnforcedAudible => Strategy::Sonification,
        StreamType::Dtmf => Strategy::Dtmf,
        StreamType::System | StreamType::Music | StreamType::Tts => Strategy::Media,
    }
}

/// Fixed-size table holding one value per [`StreamType`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamTable<T>([T; StreamType::COUNT]);

impl<T: Copy> StreamTable<T> {
    /// Creates a table with every entry set to `value`.
    pub const fn filled(value: T) -> Self {
        Self([value; StreamType::COUNT])
    }
}

impl<T> StreamTable<T> {
    /// Iterates over `(stream, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (StreamType, &T)> {
        StreamType::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T: Copy + Default> Default for StreamTable<T> {
    fn default() -> Self {
        Self::filled(T::default())
    }
}

impl<T> Index<StreamType> for StreamTable<T> {
    type Output = T;

    fn index(&self, index: StreamType) -> &Self::Output {
        &self.0[index.index()]
    }
}

impl<T> IndexMut<StreamType> for StreamTable<T> {
    fn index_mut(&mut self, index: StreamType) -> &mut Self::Output {
        &mut self.0[index.index()]
    }
}
