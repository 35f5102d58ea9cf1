use argh::FromArgs;
use std::path::PathBuf;

mod messages;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Client for the visual question answering server
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Status(StatusCommand),
    Load(LoadCommand),
    Upload(UploadCommand),
    Camera(CameraCommand),
    Url(UrlCommand),
    Ask(AskCommand),
}

#[derive(FromArgs)]
/// Show the server status
#[argh(subcommand, name = "status")]
struct StatusCommand {}

#[derive(FromArgs)]
/// Load the model on the server
#[argh(subcommand, name = "load")]
struct LoadCommand {}

#[derive(FromArgs)]
/// Upload a local image file
#[argh(subcommand, name = "upload")]
struct UploadCommand {
    /// the path to the image
    #[argh(option, short = 'i')]
    image_path: PathBuf,
}

#[derive(FromArgs)]
/// Send a captured camera frame
#[argh(subcommand, name = "camera")]
struct CameraCommand {
    /// the path to the captured frame
    #[argh(option, short = 'i')]
    image_path: PathBuf,
}

#[derive(FromArgs)]
/// Select an image by URL
#[argh(subcommand, name = "url")]
struct UrlCommand {
    /// the image URL
    #[argh(option, short = 'u')]
    url: String,
}

#[derive(FromArgs)]
/// Ask a question about the selected image
#[argh(subcommand, name = "ask")]
struct AskCommand {
    /// the question to ask
    #[argh(option, short = 'q')]
    question: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let base = format!("http://{}:{}", args.host, args.port);

    let response = match args.command {
        ClientCommands::Status(_) => client.get(format!("{base}/")).send().await?,
        ClientCommands::Load(_) => client.post(format!("{base}/model/load")).send().await?,
        ClientCommands::Upload(cmd) => {
            let bytes = tokio::fs::read(&cmd.image_path).await?;
            client
                .post(format!("{base}/image/upload"))
                .body(bytes)
                .send()
                .await?
        }
        ClientCommands::Camera(cmd) => {
            let bytes = tokio::fs::read(&cmd.image_path).await?;
            client
                .post(format!("{base}/image/camera"))
                .body(bytes)
                .send()
                .await?
        }
        ClientCommands::Url(cmd) => {
            client
                .post(format!("{base}/image/url"))
                .json(&messages::UrlRequest { url: cmd.url })
                .send()
                .await?
        }
        ClientCommands::Ask(cmd) => {
            let response = client
                .post(format!("{base}/ask"))
                .json(&messages::AskRequest {
                    question: cmd.question,
                })
                .send()
                .await?;

            if response.status().is_success() {
                let answer = response.json::<messages::AskResponse>().await?;
                println!("Answer: {}", answer.answer);
                println!("Inference time: {}", answer.latency_display);
                println!("Model size: {}", answer.model_size);
                return Ok(());
            }
            response
        }
    };

    let status = response.status();
    let result = response.json::<serde_json::Value>().await?;
    println!("[{}] {}", status, serde_json::to_string_pretty(&result)?);

    Ok(())
}
