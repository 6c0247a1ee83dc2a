use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use shared::{
    decode_binary, decode_text, encode, ClientMessage, Color, Encoding, Frame, MoveSpec,
    ServerMessage, SessionId,
};
use tokio_tungstenite::tungstenite::Message;

/// Connects to a chess coordinator, finds a match and plays a scripted game.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket URL of the server
    #[clap(short, long, default_value = "ws://127.0.0.1:3001")]
    url: String,
    /// Moves to play in order, e.g. "e2e4,g1f3"
    #[clap(short, long, value_delimiter = ',')]
    moves: Vec<String>,
    /// Send bincode binary frames instead of JSON text
    #[clap(short, long)]
    bincode: bool,
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::text(text),
        Frame::Binary(bytes) => Message::binary(bytes),
    }
}

fn side_to_move(fen: &str) -> Option<Color> {
    match fen.split_whitespace().nth(1)? {
        "w" => Some(Color::White),
        "b" => Some(Color::Black),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let encoding = if args.bincode {
        Encoding::Bincode
    } else {
        Encoding::Json
    };

    let mut script = Vec::new();
    for text in &args.moves {
        let spec = MoveSpec::parse_compact(text).ok_or(format!("Bad move {:?}", text))?;
        script.push(spec);
    }
    let mut script = script.into_iter();

    println!("Connecting to {}", args.url);
    let (ws, _) = tokio_tungstenite::connect_async(args.url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();

    sink.send(to_message(encode(&ClientMessage::FindMatch, encoding)?))
        .await?;
    println!("Searching for a match...");

    let mut game: Option<(SessionId, Color)> = None;

    while let Some(frame) = stream.next().await {
        let message: ServerMessage = match frame? {
            Message::Text(text) => decode_text(text.as_str())?,
            Message::Binary(data) => decode_binary(&data)?,
            Message::Close(_) => break,
            _ => continue,
        };
        println!("Received: {:?}", message);

        let to_move = match &message {
            ServerMessage::MatchFound { game_id, color } => {
                println!("Playing {} in {}", color.name(), game_id);
                game = Some((game_id.clone(), *color));
                Some(Color::White)
            }
            ServerMessage::MoveMade { fen, .. } => side_to_move(fen),
            ServerMessage::GameOver { reason } => {
                println!("Game over: {}", reason);
                break;
            }
            ServerMessage::OpponentDisconnected => {
                println!("Opponent disconnected");
                break;
            }
            ServerMessage::ServerFull => {
                println!("Server is full");
                break;
            }
            ServerMessage::Connected { .. } => None,
        };

        let Some((game_id, color)) = &game else {
            continue;
        };
        if to_move != Some(*color) {
            continue;
        }

        match script.next() {
            Some(mv) => {
                println!("Playing {}", mv);
                let request = ClientMessage::MakeMove {
                    game_id: game_id.clone(),
                    mv,
                };
                sink.send(to_message(encode(&request, encoding)?)).await?;
            }
            None => {
                println!("Out of scripted moves");
                break;
            }
        }
    }

    sink.close().await?;
    Ok(())
}
