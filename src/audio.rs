use rodio::{OutputStream, Sink, Source, source::SineWave};

pub const DEFAULT_FREQUENCY: f32 = 440.0;

/// Continuous tone that is paused or played to follow the sound timer.
pub struct Beep {
    sink: Sink,
    #[allow(dead_code)]
    stream: OutputStream,
}

impl Beep {
    pub fn new(freq: f32) -> anyhow::Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&stream_handle)?;
        let source = SineWave::new(freq).amplify(0.2).repeat_infinite();

        sink.append(source);
        sink.pause();

        Ok(Self { sink, stream })
    }

    pub fn set(&mut self, on: bool) {
        if on && self.sink.is_paused() {
            self.sink.play();
        } else if !on && !self.sink.is_paused() {
            self.sink.pause();
        }
    }
}
