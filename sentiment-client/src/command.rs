use crate::error::ClientError;
use sentiment_bot::protocol::ClientCommand;

pub const HELP: &str = "\
Commands:
  /analyze <query>            one-shot analysis, eg/ /analyze BTCUSDT 1 day
  /signal <symbol> <timeframe> save a signal, eg/ /signal BTCUSDT 4h
  /resend                     analyse the saved signal now
  /loop <interval>            analyse the saved signal every interval, eg/ /loop 15m
  /status                     show the loop status
  /stop                       stop the loop
  /help                       show this help
  /quit                       exit
Any other text is analysed as a query.";

/// Parsed terminal input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(ClientCommand),
    Help,
    Quit,
}

/// Parse a terminal input line, `None` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<Input>, ClientError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(command) = line.strip_prefix('/') else {
        return Ok(Some(Input::Command(ClientCommand::Analyze {
            query: line.to_string(),
        })));
    };

    let (name, args) = command
        .split_once(char::is_whitespace)
        .map(|(name, args)| (name, args.trim()))
        .unwrap_or((command, ""));

    let input = match name.to_lowercase().as_str() {
        "analyze" | "analyse" => {
            if args.is_empty() {
                return Err(ClientError::Usage("/analyze <query>"));
            }
            Input::Command(ClientCommand::Analyze {
                query: args.to_string(),
            })
        }
        "signal" => {
            let (symbol, timeframe) = args
                .split_once(char::is_whitespace)
                .map(|(symbol, timeframe)| (symbol, timeframe.trim()))
                .filter(|(_, timeframe)| !timeframe.is_empty())
                .ok_or(ClientError::Usage("/signal <symbol> <timeframe>"))?;
            Input::Command(ClientCommand::SetSignal {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            })
        }
        "resend" => Input::Command(ClientCommand::ResendSignal),
        "loop" => {
            if args.is_empty() {
                return Err(ClientError::Usage("/loop <interval>"));
            }
            Input::Command(ClientCommand::EnableLoop {
                interval: args.to_string(),
            })
        }
        "status" => Input::Command(ClientCommand::LoopStatus),
        "stop" => Input::Command(ClientCommand::StopLoop),
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(ClientError::UnknownCommand(other.to_string())),
    };

    Ok(Some(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        struct TestCase {
            input: &'static str,
            expected: Result<Option<Input>, ClientError>,
        }

        let tests = vec![
            TestCase {
                // TC0: blank line
                input: "   ",
                expected: Ok(None),
            },
            TestCase {
                // TC1: plain text is analysed
                input: "BTCUSDT 1 day",
                expected: Ok(Some(Input::Command(ClientCommand::Analyze {
                    query: "BTCUSDT 1 day".to_string(),
                }))),
            },
            TestCase {
                // TC2: explicit analyze
                input: "/analyze  LTCUSDT 10 hours ",
                expected: Ok(Some(Input::Command(ClientCommand::Analyze {
                    query: "LTCUSDT 10 hours".to_string(),
                }))),
            },
            TestCase {
                // TC3: signal with word timeframe
                input: "/signal BTCUSDT 2 days",
                expected: Ok(Some(Input::Command(ClientCommand::SetSignal {
                    symbol: "BTCUSDT".to_string(),
                    timeframe: "2 days".to_string(),
                }))),
            },
            TestCase {
                // TC4: signal without timeframe
                input: "/signal BTCUSDT",
                expected: Err(ClientError::Usage("/signal <symbol> <timeframe>")),
            },
            TestCase {
                // TC5: loop
                input: "/LOOP 15m",
                expected: Ok(Some(Input::Command(ClientCommand::EnableLoop {
                    interval: "15m".to_string(),
                }))),
            },
            TestCase {
                // TC6: loop without interval
                input: "/loop",
                expected: Err(ClientError::Usage("/loop <interval>")),
            },
            TestCase {
                // TC7: unit commands
                input: "/status",
                expected: Ok(Some(Input::Command(ClientCommand::LoopStatus))),
            },
            TestCase {
                // TC8: quit
                input: "/exit",
                expected: Ok(Some(Input::Quit)),
            },
            TestCase {
                // TC9: unknown command
                input: "/subscribe BTCUSDT",
                expected: Err(ClientError::UnknownCommand("subscribe".to_string())),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = parse_line(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
